use crate::config::ReplayConfig;
use anyhow::Result;
use barflow_core::{Bar, InputValue, Tick, ValueKind};
use barflow_indicators::history::WithHistory;
use barflow_indicators::{Indicator, IndicatorValue};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// How replay output is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub print_previews: bool,
}

/// A configured indicator under replay.
#[derive(Debug)]
pub struct Slot {
    pub label: String,
    pub indicator: WithHistory<Box<dyn Indicator>>,
}

#[derive(Serialize)]
struct Record<'a> {
    label: &'a str,
    name: &'static str,
    #[serde(flatten)]
    value: &'a IndicatorValue,
}

pub fn build_slots(config: &ReplayConfig) -> Result<Vec<Slot>> {
    config
        .indicators
        .iter()
        .map(|entry| -> Result<Slot> {
            let indicator = entry.kind.build()?;
            Ok(Slot {
                label: entry.label(),
                indicator: WithHistory::with_capacity(indicator, config.history_capacity)?,
            })
        })
        .collect()
}

/// Partial bars for `bar`: `steps` snapshots with the close walking from the
/// open toward the final close. High/low only cover the path seen so far.
pub fn intra_bar_previews(bar: &Bar, steps: usize) -> Vec<InputValue> {
    let denominator = Decimal::from(steps + 1);
    let mut high = bar.open;
    let mut low = bar.open;
    (1..=steps)
        .map(|step| {
            let fraction = Decimal::from(step) / denominator;
            let price = bar.open + (bar.close - bar.open) * fraction;
            high = high.max(price);
            low = low.min(price);
            let partial = Bar::new(bar.timestamp, bar.open, high, low, price, bar.volume * fraction);
            InputValue::bar(partial, false)
        })
        .collect()
}

/// Replays `bars` through every slot, emitting `preview_steps` previews before
/// each final bar.
pub fn replay_bars<W: Write>(
    slots: &mut [Slot],
    bars: &[Bar],
    preview_steps: usize,
    options: OutputOptions,
    out: &mut W,
) -> Result<usize> {
    let mut emitted = 0;
    for bar in bars {
        for preview in intra_bar_previews(bar, preview_steps) {
            emitted += feed(slots, &preview, options, out)?;
        }
        emitted += feed(slots, &InputValue::bar(*bar, true), options, out)?;
    }
    Ok(emitted)
}

/// Replays ticks as final inputs.
pub fn replay_ticks<W: Write>(
    slots: &mut [Slot],
    ticks: &[Tick],
    options: OutputOptions,
    out: &mut W,
) -> Result<usize> {
    let mut emitted = 0;
    for tick in ticks {
        emitted += feed(slots, &InputValue::tick(tick, true), options, out)?;
    }
    Ok(emitted)
}

fn feed<W: Write>(
    slots: &mut [Slot],
    input: &InputValue,
    options: OutputOptions,
    out: &mut W,
) -> Result<usize> {
    let mut emitted = 0;
    for slot in slots.iter_mut() {
        let value = slot.indicator.process(input);
        if !input.is_final && !options.print_previews {
            continue;
        }
        if options.json {
            let record = Record {
                label: &slot.label,
                name: slot.indicator.name(),
                value: &value,
            };
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
        } else {
            writeln!(
                out,
                "{} {:<12} {:<7} {:<6} {}",
                value.time.format("%Y-%m-%d %H:%M:%S"),
                slot.label,
                if value.is_final { "final" } else { "preview" },
                if value.is_formed { "formed" } else { "warm" },
                render(&value.kind),
            )?;
        }
        emitted += 1;
    }
    Ok(emitted)
}

/// Text rendering of a value; composites list their lines in order.
pub fn render(kind: &ValueKind) -> String {
    match kind {
        ValueKind::Empty => "-".to_string(),
        ValueKind::Scalar(v) => v.round_dp(6).normalize().to_string(),
        ValueKind::Shifted { value, shift } => {
            format!("{} (-{})", value.round_dp(6).normalize(), shift)
        }
        ValueKind::Composite(values) => {
            let parts: Vec<String> = values.values().map(|v| render(&v.kind)).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

/// Logs formed state and the most recent committed values of every slot.
pub fn summarize(slots: &[Slot], recent: usize) {
    for slot in slots {
        let indicator = &slot.indicator;
        if !indicator.is_formed() {
            warn!(
                label = %slot.label,
                needed = indicator.num_values_to_initialize(),
                seen = indicator.history().len(),
                "indicator never formed"
            );
        }
        let history: Vec<String> = (0..recent.min(indicator.history().len()))
            .filter_map(|n| indicator.output_at(n).ok())
            .map(|value| render(&value.kind))
            .collect();
        info!(
            label = %slot.label,
            name = indicator.name(),
            formed = indicator.is_formed(),
            warm_up = indicator.num_values_to_initialize(),
            recent = %history.join(" | "),
            "summary"
        );
    }
}
