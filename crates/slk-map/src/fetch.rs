//! `slk-map fetch`: batch georeferencing from a JSON file

use crate::cli::FetchArgs;
use anyhow::Context;
use slk_batch::{
    BatchClient, FetchState, GeoFeatureCollection, LinearReferenceQuery, MappedRow, RowJoin,
    join_rows,
};
use slk_geom::MeasuredPolyline;
use std::path::Path;

pub async fn run(args: &FetchArgs) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let queries = parse_queries(&text)
        .with_context(|| format!("Failed to parse queries in {}", args.input.display()))?;

    let config = args.client_config();
    tracing::info!(
        queries = queries.len(),
        endpoint = %config.endpoint,
        "Fetching batch"
    );
    let client = BatchClient::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;

    let result = client.fetch(&queries, args.offset_multiplier).await;
    let state = FetchState::resolve(&FetchState::Pending, &result);
    tracing::info!(%state, "Fetch finished");
    let collection = result?;

    report(&join_rows(&queries, &collection));

    let json = render_geojson(&collection)?;
    match &args.output {
        Some(path) => write_file(path, &json).await?,
        None => println!("{json}"),
    }
    Ok(())
}

pub fn parse_queries(text: &str) -> anyhow::Result<Vec<LinearReferenceQuery>> {
    Ok(serde_json::from_str(text)?)
}

pub fn render_geojson(collection: &GeoFeatureCollection) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&collection.to_geojson())?)
}

/// Total length of a row's geometry in map units
pub fn mapped_length(row: &MappedRow) -> f64 {
    row.geometry
        .0
        .iter()
        .map(|part| MeasuredPolyline::from_line_string(part).magnitude())
        .sum()
}

fn report(join: &RowJoin) {
    for row in &join.non_mappable {
        tracing::warn!(
            row = row.row_number,
            road = %row.query.road,
            slk_from = row.query.slk_from,
            slk_to = row.query.slk_to,
            cwy = %row.query.carriageway,
            reason = %row.reason,
            "Row could not be mapped"
        );
    }

    let total_length: f64 = join.mapped.iter().map(mapped_length).sum();
    tracing::info!(
        mapped = join.mapped.len(),
        non_mappable = join.non_mappable.len(),
        total_length,
        "Rows joined"
    );
}

async fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "GeoJSON written");
    Ok(())
}
