use crate::infra::{build_service, load_dataset};
use clap::Args;
use std::path::PathBuf;
use trial_match::config::AppConfig;
use trial_match::error::AppError;
use trial_match::matching::{MatchRequest, MatchResponse};

#[derive(Args, Debug)]
pub(crate) struct QueryArgs {
    /// Free-text eligibility query (omit to match everyone)
    #[arg(long)]
    query: Option<String>,
    /// Trial-site postal code; repeat the flag for multiple sites
    #[arg(long = "site")]
    sites: Vec<String>,
    /// Maximum number of results to print (omit to print all)
    #[arg(long)]
    limit: Option<usize>,
    /// Override the configured patients dataset path
    #[arg(long)]
    patients: Option<PathBuf>,
    /// Override the configured activities dataset path
    #[arg(long)]
    activities: Option<PathBuf>,
}

/// One-shot run of the full pipeline against the configured datasets,
/// rendered to stdout.
pub(crate) async fn run_query(args: QueryArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(patients) = args.patients {
        config.datasets.patients_path = patients;
    }
    if let Some(activities) = args.activities {
        config.datasets.activities_path = activities;
    }

    let service = build_service(&config.datasets, config.matching.clone());
    let dataset = load_dataset(&config.datasets).await?;
    service.install_dataset(dataset);

    let request = MatchRequest {
        query: args.query.clone(),
        site_postal_codes: args.sites.clone(),
        limit: args.limit,
    };
    let response = service.query(request).await?;

    render_response(&args, &response);
    Ok(())
}

fn render_response(args: &QueryArgs, response: &MatchResponse) {
    println!("Patient matching query");
    println!(
        "Query: {}",
        args.query.as_deref().unwrap_or("(match everyone)")
    );
    if args.sites.is_empty() {
        println!("Sites: none");
    } else {
        println!("Sites: {}", args.sites.join(", "));
    }

    if let Some(message) = &response.message {
        println!("\nNo results: {message}");
        return;
    }

    println!(
        "\nReturning {} of {} matching patients",
        response.returned_patients, response.total_matching_patients
    );

    for patient in &response.patients {
        let age = patient
            .age
            .map_or_else(|| "?".to_string(), |age| age.to_string());
        println!(
            "- {} | age {} | {} | {} | {:.2}% (total {})",
            patient.patient_id,
            age,
            patient.sex.unwrap_or("?"),
            patient.indication.as_deref().unwrap_or("unknown indication"),
            patient.match_score_percent,
            patient.score_details.total_business_score
        );
        for entry in &patient.score_details.breakdown {
            println!(
                "    {} ({} points): {}",
                entry.criterion, entry.points, entry.reason
            );
        }
    }
}
