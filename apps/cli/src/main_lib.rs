use chrono::{FixedOffset, Utc};
use rust_decimal::Decimal;
use sbv_rate_market_data::RateResult;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Vietnam is UTC+7 all year.
const VIETNAM_UTC_OFFSET_SECS: i32 = 7 * 3600;

pub fn init_tracing() {
    let log_format = std::env::var("SBV_RATE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Today's date in Vietnam, as `YYYY-MM-DD`.
pub fn today_in_vietnam() -> String {
    let today = FixedOffset::east_opt(VIETNAM_UTC_OFFSET_SECS)
        .map(|tz| Utc::now().with_timezone(&tz).date_naive())
        .unwrap_or_else(|| Utc::now().date_naive());
    today.format("%Y-%m-%d").to_string()
}

/// Group the integer digits with commas, keeping the fraction as printed.
pub fn format_vnd(rate: Decimal) -> String {
    let text = rate.to_string();
    let (integer, fraction) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(text.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    match fraction {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}

/// Plain-text report of a lookup.
pub fn render(result: &RateResult) -> String {
    let mut lines = Vec::new();

    match (result.rate, &result.source, result.authority) {
        (Some(rate), Some(source), Some(authority)) => {
            lines.push(format!("1 USD = {} VND", format_vnd(rate)));
            lines.push(format!("Source: {} ({})", source, authority));
            if let Some(as_of) = result.as_of.filter(|d| *d != result.date.naive()) {
                lines.push(format!(
                    "Note: rate is effective {}, requested {}",
                    as_of, result.date
                ));
            }
        }
        _ => {
            lines.push(format!("No USD-VND rate found for {}", result.date));
            for attempt in &result.trace {
                lines.push(format!("  {}: {}", attempt.source, attempt.reason()));
            }
        }
    }

    lines.join("\n")
}
