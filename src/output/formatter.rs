use owo_colors::OwoColorize;
use std::io::IsTerminal;
use terminal_size::{terminal_size, Width};

use crate::engine::{Keyword, LuckReport, Reading, VolatilityIndex};
use crate::hourly::{HourlyForecast, HourlyReport, Signal};
use crate::sales::SalesLog;
use crate::service::{DailyLuckSummary, ServiceKind, ServicePrices};

/// Bar width used when stdout is not a terminal
const DEFAULT_BAR_WIDTH: usize = 20;
const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate text to fit available width, accounting for Unicode
fn truncate_text(text: &str, max_width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_width {
        text.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Horizontal bar for a score in [0, 1]
pub fn score_bar(score: f64, width: usize) -> String {
    let filled = (score.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn paint_keyword(keyword: Keyword, use_colors: bool) -> String {
    let text = keyword.as_str();
    if !use_colors {
        return text.to_string();
    }
    match keyword {
        Keyword::StrongBullish => text.green().bold().to_string(),
        Keyword::Bullish => text.green().to_string(),
        Keyword::Neutral => text.yellow().to_string(),
        Keyword::Bearish => text.red().to_string(),
        Keyword::StrongBearish => text.red().bold().to_string(),
    }
}

fn signal_label(signal: Signal) -> &'static str {
    match signal {
        Signal::StrongBuy => "STRONG_BUY",
        Signal::Buy => "BUY",
        Signal::Neutral => "NEUTRAL",
        Signal::Caution => "CAUTION",
        Signal::Avoid => "AVOID",
    }
}

fn paint_signal(signal: Signal, use_colors: bool) -> String {
    let text = format!("{:<10}", signal_label(signal));
    if !use_colors {
        return text;
    }
    match signal {
        Signal::StrongBuy => text.green().bold().to_string(),
        Signal::Buy => text.green().to_string(),
        Signal::Neutral => text.to_string(),
        Signal::Caution => text.yellow().to_string(),
        Signal::Avoid => text.red().to_string(),
    }
}

fn volatility_label(volatility: VolatilityIndex) -> &'static str {
    match volatility {
        VolatilityIndex::High => "HIGH",
        VolatilityIndex::Low => "LOW",
    }
}

fn join_labels<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a luck report as a multi-line summary
pub fn format_report(report: &LuckReport, use_colors: bool) -> String {
    let score = format!("{:.2}", report.trading_luck_score);
    let score = if use_colors {
        score.bold().to_string()
    } else {
        score
    };

    let mut lines = vec![
        format!(
            "Trading luck: {} (raw {}) {}",
            score,
            report.raw_score,
            paint_keyword(report.keyword, use_colors)
        ),
        format!("  {}", score_bar(report.trading_luck_score, DEFAULT_BAR_WIDTH)),
        format!("  Sectors: {}", join_labels(&report.favorable_sectors)),
        format!(
            "  Volatility: {}  Sentiment: {:?}  Wealth: {:?}",
            volatility_label(report.volatility_index),
            report.market_sentiment,
            report.wealth_opportunity
        ),
        format!("  Strategy: {}", report.keyword.strategy()),
    ];
    lines.extend(report.breakdown.iter().map(|line| format!("  {}", line)));
    lines.join("\n")
}

/// Format the five-field daily reading
pub fn format_daily_summary(target_date: &str, summary: &DailyLuckSummary, use_colors: bool) -> String {
    let score = format!("{:.2}", summary.trading_luck_score);
    let score = if use_colors {
        score.bold().to_string()
    } else {
        score
    };
    format!(
        "{} {}  {}\n  Sectors: {}\n  Volatility: {}  Sentiment: {:?}  Wealth: {:?}",
        target_date,
        score,
        score_bar(summary.trading_luck_score, DEFAULT_BAR_WIDTH),
        join_labels(&summary.favorable_sectors),
        volatility_label(summary.volatility_index),
        summary.market_sentiment,
        summary.wealth_opportunity
    )
}

/// Format the full chart derivation behind a reading
pub fn format_reading_detail(reading: &Reading, use_colors: bool) -> String {
    let chart = &reading.chart;
    let tally = chart
        .elements
        .iter()
        .map(|(element, count)| format!("{} {}", element, count))
        .collect::<Vec<_>>()
        .join(", ");
    let favorable = format!(
        "{} (auxiliary {}{})",
        chart.favorable.favorable,
        chart.favorable.auxiliary,
        if chart.favorable.strong { ", strong" } else { "" }
    );
    let pillars = if use_colors {
        chart.pillars.to_string().cyan().to_string()
    } else {
        chart.pillars.to_string()
    };

    format!(
        "Pillars: {}\n  Elements: {}\n  Favorable: {}\n  Clashes: {}  Harmonies: {}\n  Decade cycle: {} (age {}-{}, from {})\n  Year pillar: {}",
        pillars,
        tally,
        favorable,
        chart.interactions.clash,
        chart.interactions.harmony,
        reading.decade.pillar,
        reading.decade.start_age,
        reading.decade.end_age,
        reading.decade.start_year,
        reading.year
    )
}

fn hourly_bar_width(term_width: Option<usize>) -> usize {
    // time(5) + golden(2) + score(4) + element(6) + signal(10) + gaps, rest shared with reason
    match term_width {
        Some(width) => (width.saturating_sub(40) / 2).clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH),
        None => DEFAULT_BAR_WIDTH,
    }
}

fn format_hour_row(
    forecast: &HourlyForecast,
    bar_width: usize,
    reason_width: Option<usize>,
    use_colors: bool,
) -> String {
    let marker = if forecast.is_golden { "*" } else { " " };
    let reason = match reason_width {
        Some(width) => truncate_text(&forecast.reason, width),
        None => forecast.reason.clone(),
    };
    let bar = score_bar(forecast.score, bar_width);
    let (time, marker, bar) = if use_colors {
        (
            forecast.time.dimmed().to_string(),
            marker.yellow().bold().to_string(),
            if forecast.is_golden {
                bar.yellow().to_string()
            } else {
                bar
            },
        )
    } else {
        (forecast.time.clone(), marker.to_string(), bar)
    };

    format!(
        "{}{} {:.2} {} {:<5} {} {}",
        time,
        marker,
        forecast.score,
        bar,
        forecast.element.to_string(),
        paint_signal(forecast.signal, use_colors),
        reason
    )
}

/// Format the 24-hour forecast as a table followed by the strategy summary
pub fn format_hourly_table(report: &HourlyReport, use_colors: bool) -> String {
    let term_width = get_terminal_width();
    let bar_width = hourly_bar_width(term_width);
    // Columns before the reason: time+marker(6) score(5) bar element(6) signal(11)
    let fixed = 6 + 5 + bar_width + 1 + 6 + 11;
    let reason_width = term_width.map(|w| w.saturating_sub(fixed).max(20));

    let mut lines: Vec<String> = report
        .hourly_forecast
        .iter()
        .map(|f| format_hour_row(f, bar_width, reason_width, use_colors))
        .collect();

    let analysis = &report.hourly_analysis;
    lines.push(String::new());
    lines.push(format!(
        "Max {:.2}  Min {:.2}  Spread {:.2}",
        analysis.max_score, analysis.min_score, analysis.spread
    ));
    if let Some(warning) = &analysis.volatility_warning {
        let warning = format!("Warning: {}", warning);
        lines.push(if use_colors {
            warning.red().to_string()
        } else {
            warning
        });
    }

    let strategy = &report.strategy;
    let action = if use_colors {
        strategy.action.bold().to_string()
    } else {
        strategy.action.clone()
    };
    lines.push(format!(
        "Strategy: {} (window {})",
        action, strategy.best_window
    ));
    lines.push(format!("  {}", strategy.pro_tip));
    lines.join("\n")
}

/// Format the sales log totals, per-service revenue, and the latest sale
pub fn format_sales_summary(log: &SalesLog, prices: &ServicePrices, use_colors: bool) -> String {
    if log.sales.is_empty() {
        return "No sales recorded.".to_string();
    }

    let revenue = format!("{:.4} USDC", log.total_revenue_usdc);
    let revenue = if use_colors {
        revenue.green().bold().to_string()
    } else {
        revenue
    };
    let mut lines = vec![format!("Sales: {}  Revenue: {}", log.total_sales, revenue)];

    let by_service = log.revenue_by_service();
    for kind in ServiceKind::ALL {
        let count = log.sales.iter().filter(|s| s.service == kind).count();
        let total = by_service.get(&kind).copied().unwrap_or(0.0);
        lines.push(format!(
            "  {:<10} {:>4} sold  {:.4} USDC  (listed at {:.2})",
            kind.name(),
            count,
            total,
            kind.price(prices)
        ));
    }

    if let Some(last) = log.last_sale() {
        lines.push(format!(
            "  Last: job {} {} by {} at {}",
            last.job_id,
            last.service,
            last.buyer,
            last.timestamp.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    lines.join("\n")
}
