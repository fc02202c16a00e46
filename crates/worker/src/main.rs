use anyhow::Context;
use clap::{Parser, ValueEnum};
use dcf_core::domain::{Assumptions, DiscountAnchor, PairingMode, Period, StatementKind, Symbol};
use dcf_core::ingest::FmpDataProvider;
use dcf_core::service::{DcfService, ServiceOptions};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "dcf_worker", about = "Run a discounted cash flow valuation for one ticker")]
struct Args {
    /// Ticker symbol, 1-5 letters (e.g. AAPL).
    symbol: String,

    /// Statement period: annual or quarter.
    #[arg(long, default_value = "annual")]
    period: String,

    /// Number of periods to fetch. Defaults to DCF_YEARS or 5.
    #[arg(long)]
    years: Option<u32>,

    /// Discount rate (WACC) as a fraction. Defaults to DCF_DISCOUNT_RATE or 0.10.
    #[arg(long)]
    discount_rate: Option<f64>,

    /// Perpetual growth rate as a fraction. Defaults to DCF_TERMINAL_GROWTH_RATE or 0.03.
    #[arg(long)]
    terminal_growth_rate: Option<f64>,

    /// Net debt override. Estimated as 5% of enterprise value when omitted.
    #[arg(long, allow_hyphen_values = true)]
    net_debt: Option<f64>,

    /// Which UFCF entry is discounted as year 1.
    #[arg(long)]
    anchor: Option<DiscountAnchor>,

    /// How income and cash-flow statements are matched.
    #[arg(long)]
    pairing: Option<PairingMode>,

    #[arg(long, value_enum, default_value_t = Output::Valuation)]
    output: Output,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Valuation,
    Ufcf,
    Metrics,
    /// Raw income statements as returned by the provider.
    Income,
    /// Raw cash-flow statements as returned by the provider.
    CashFlow,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = dcf_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let res = run(&settings, args).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "dcf run failed");
    }
    res
}

async fn run(settings: &dcf_core::config::Settings, args: Args) -> anyhow::Result<()> {
    let symbol = Symbol::parse(&args.symbol)?;
    let period: Period = args.period.parse()?;

    let options = apply_overrides(ServiceOptions::from_env()?, &args);
    options
        .assumptions
        .validate()
        .context("invalid discount / terminal growth rates")?;

    let provider = FmpDataProvider::from_settings(settings)?;
    let service = DcfService::new(Arc::new(provider), options);

    tracing::info!(%symbol, %period, years = options.years, output = ?args.output, "dcf run started");

    let value = match args.output {
        Output::Metrics => serde_json::to_value(service.dcf_data(&symbol, period, options.years).await?)?,
        Output::Ufcf => serde_json::to_value(service.ufcf(&symbol, period, options.years).await?)?,
        Output::Income => serde_json::to_value(
            service
                .statements(&symbol, period, options.years, StatementKind::Income)
                .await?,
        )?,
        Output::CashFlow => serde_json::to_value(
            service
                .statements(&symbol, period, options.years, StatementKind::CashFlow)
                .await?,
        )?,
        Output::Valuation => serde_json::to_value(
            service
                .valuation(&symbol, period, options.years, &options.assumptions, args.net_debt)
                .await?,
        )?,
    };

    let rendered = if args.compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };
    println!("{rendered}");
    Ok(())
}

fn apply_overrides(mut options: ServiceOptions, args: &Args) -> ServiceOptions {
    if let Some(years) = args.years {
        options.years = years;
    }
    let Assumptions {
        discount_rate,
        terminal_growth_rate,
        anchor,
    } = options.assumptions;
    options.assumptions = Assumptions {
        discount_rate: args.discount_rate.unwrap_or(discount_rate),
        terminal_growth_rate: args.terminal_growth_rate.unwrap_or(terminal_growth_rate),
        anchor: args.anchor.unwrap_or(anchor),
    };
    if let Some(pairing) = args.pairing {
        options.pairing = pairing;
    }
    options
}

fn init_sentry(settings: &dcf_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
