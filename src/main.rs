use lab_lottery::config::{AppConfig, DrawOptions, DEFAULT_PORT};
use lab_lottery::display::{print_history, print_outcome, write_outcome_to_file};
use lab_lottery::history::open_history_store;
use lab_lottery::logging;
use lab_lottery::lottery::ThreadRandom;
use lab_lottery::requests::RequestQueue;
use lab_lottery::roster::CsvRosterStore;
use lab_lottery::service::run_draw;
use lab_lottery::web::{self, AppState};
use tracing::info;

const USAGE: &str = "usage: lab-lottery [draw [--emergency N] [--threshold N] [--guarantee-max N] [--max-winners N] | history | web [port]]";

/// Reads `--flag value` pairs into draw options
fn parse_draw_options(args: &[String]) -> Result<DrawOptions, String> {
    let mut options = DrawOptions::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| format!("missing value for {}", flag))?
            .parse::<i32>()
            .map_err(|e| format!("invalid value for {}: {}", flag, e))?;
        match flag.as_str() {
            "--emergency" => options.emergency_slots = value,
            "--threshold" => options.guarantee_threshold = value,
            "--guarantee-max" => options.guarantee_max_count = value,
            "--max-winners" => options.max_winners = value,
            other => return Err(format!("unknown option {}\n{}", other, USAGE)),
        }
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(logging::DEFAULT_FILTER);

    let config = AppConfig::from_env();
    let args: Vec<String> = std::env::args().collect();
    let mode = args.get(1).map(String::as_str).unwrap_or("draw");

    match mode {
        "web" => {
            let port = args
                .get(2)
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT);
            let state = AppState::from_config(&config)?;

            info!(port, data_dir = %config.data_dir().display(), "starting web server");
            println!("Access the API at http://localhost:{}/api/participants", port);

            web::start_server(port, state).await?;
        }
        "history" => {
            let history = open_history_store(config.history_location().as_deref());
            print_history(&history.read()?);
        }
        "draw" => {
            let options = parse_draw_options(args.get(2..).unwrap_or(&[]))?;
            let mut roster = CsvRosterStore::open(config.roster_path())?;
            let mut requests = RequestQueue::open(config.requests_path())?;
            let mut history = open_history_store(config.history_location().as_deref());

            let result = run_draw(
                &mut roster,
                &mut requests,
                history.as_mut(),
                &mut ThreadRandom,
                &options,
                None,
            );
            let (outcome, save_error) = match result {
                Ok(outcome) => (outcome, None),
                Err(e) => match e.unsaved_outcome().cloned() {
                    Some(outcome) => (outcome, Some(e)),
                    None => return Err(e.into()),
                },
            };
            print_outcome(&outcome);

            let report = config
                .data_dir()
                .join(format!("draw_{}.txt", outcome.history_entry.id));
            write_outcome_to_file(&outcome, &report)?;
            println!("\nDraw saved to {}", report.display());

            if let Some(e) = save_error {
                eprintln!("Roster or history was not updated; record this draw by hand from the report above");
                return Err(e.into());
            }
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
