use market_movers::calendar::{Clock, FixedClock, MarketOracle, NyseCalendar, ReferenceZone, SystemClock};
use market_movers::config::Config;
use market_movers::scrapers::YahooClient;
use market_movers::services::DataService;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{App, Arg, ArgMatches, SubCommand};
use log::info;
use std::sync::Arc;

fn parse_count(matches: &ArgMatches, name: &str) -> anyhow::Result<Option<usize>> {
    matches
        .value_of(name)
        .map(|v| {
            v.parse::<usize>()
                .with_context(|| format!("invalid --{} value: {}", name, v))
        })
        .transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = App::new("market_movers")
        .version("0.1.0")
        .about("Tracks daily top gainers/losers and their subsequent-day drift")
        .arg(
            Arg::with_name("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding movers.json, subsequent_cache.json and the CSV report")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("now")
                .long("now")
                .value_name("RFC3339")
                .help("Simulate the current time (e.g. 2026-03-02T21:00:00-05:00)")
                .takes_value(true)
                .global(true),
        )
        .subcommand(SubCommand::with_name("run").about("Daily job: acquire, track one round, regenerate report"))
        .subcommand(
            SubCommand::with_name("acquire")
                .about("Scrape and persist today's top movers")
                .arg(
                    Arg::with_name("top-n")
                        .long("top-n")
                        .value_name("N")
                        .help("Number of gainers and losers to keep")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("track")
                .about("Append at most one subsequent day per tracked mover")
                .arg(
                    Arg::with_name("max-days")
                        .long("max-days")
                        .value_name("N")
                        .help("Maximum subsequent days per mover (1-11)")
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("report").about("Regenerate the CSV report"))
        .subcommand(SubCommand::with_name("status").about("Show store statistics"));

    let matches = app.get_matches();

    let mut config = Config::from_env();
    if let Some(dir) = matches.value_of("data-dir") {
        config = config.with_data_dir(dir);
    }
    if let Some(sub) = matches.subcommand_matches("acquire") {
        if let Some(n) = parse_count(sub, "top-n")? {
            config = config.with_top_n(n);
        }
    }
    if let Some(sub) = matches.subcommand_matches("track") {
        if let Some(n) = parse_count(sub, "max-days")? {
            config = config.with_max_days(n);
        }
    }

    let clock: Arc<dyn Clock> = match matches.value_of("now") {
        Some(now) => {
            let now = DateTime::parse_from_rfc3339(now)
                .with_context(|| format!("invalid --now value: {}", now))?;
            info!("Simulated clock: {}", now);
            Arc::new(FixedClock::new(now.with_timezone(&Utc)))
        }
        None => Arc::new(SystemClock),
    };

    let zone = ReferenceZone::resolve(&config.timezone);
    let oracle = Arc::new(MarketOracle::new(
        clock,
        Arc::new(NyseCalendar::new(&config.extra_holidays)),
        zone,
    ));
    let yahoo = Arc::new(YahooClient::new(zone)?);
    let service = DataService::new(config, oracle, yahoo.clone(), yahoo);

    match matches.subcommand_name() {
        Some("acquire") => {
            let outcome = service.acquire_today().await;
            info!("Acquisition: {:?}", outcome);
        }
        Some("track") => {
            let appended = service.advance_all().await;
            println!("Appended: {}", appended);
        }
        Some("report") => {
            let rows = service.regenerate();
            println!("Rows written: {}", rows);
        }
        Some("status") => {
            let status = service.status();
            println!("Event dates:      {}", status.event_dates);
            println!("Tracked series:   {}", status.tracked_series);
            println!("Complete series:  {}", status.complete_series);
            println!("Pending series:   {}", status.pending_series);
            println!("Malformed entries: {}", status.malformed_entries);
        }
        _ => {
            let summary = service.run_daily().await;
            info!(
                "Daily run finished: {:?}, {} day(s) appended, {} report row(s)",
                summary.acquisition, summary.appended, summary.report_rows
            );
        }
    }

    Ok(())
}
