//! `slk-map ticks`: tick layout for one rendered road segment

use crate::cli::TickArgs;
use anyhow::Context;
use serde::Serialize;
use slk_geom::{
    LabelPlacement, MeasuredPolyline, TickGenerator, TickMark, TickSchedule, TickSpacing,
};

#[derive(Debug, Serialize)]
pub struct TickReport {
    pub spacing: TickSpacing,
    pub ticks: Vec<TickMark>,
    pub labels: Vec<LabelPlacement>,
}

pub fn run(args: &TickArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let points: Vec<[f64; 2]> = serde_json::from_str(&text)
        .with_context(|| format!("Expected a JSON array of [x, y] in {}", args.input.display()))?;

    let report = layout(args, points);
    tracing::info!(
        ticks = report.ticks.len(),
        labels = report.labels.len(),
        minor_interval = report.spacing.minor_interval,
        "Ticks generated"
    );

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

pub fn layout(args: &TickArgs, points: Vec<[f64; 2]>) -> TickReport {
    let mut polyline = MeasuredPolyline::from_points(points);
    if args.offset_px != 0.0 {
        polyline = match polyline.offset(args.offset_px) {
            Some(offset_points) => MeasuredPolyline::from_points(offset_points),
            None => {
                tracing::warn!("Polyline has no usable segments to offset");
                MeasuredPolyline::empty()
            }
        };
    }

    let spacing = TickSchedule::for_resolution(args.resolution);
    let mut generator = TickGenerator::new(args.slk_from, args.slk_to, spacing);
    if args.width.is_some() || args.height.is_some() {
        generator = generator.with_canvas(
            args.width.unwrap_or(f64::INFINITY),
            args.height.unwrap_or(f64::INFINITY),
        );
    }
    if let Some(side) = args.carriageway {
        generator = generator.with_side(side.into());
    }

    let ticks = generator.generate(&polyline);
    let labels = ticks.iter().filter_map(TickMark::label_placement).collect();
    TickReport {
        spacing,
        ticks,
        labels,
    }
}
