use crate::analysis::AnalysisReport;
use crate::indicators::RsiZone;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let cell = Cell::new(t).add_attribute(Attribute::Bold);
            if i > 1 { cell.set_alignment(CellAlignment::Right) } else { cell }
        })
        .collect()
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn zone_color(zone: Option<RsiZone>) -> Color {
    match zone {
        Some(RsiZone::Overbought) => Color::Red,
        Some(RsiZone::Oversold) => Color::Green,
        Some(RsiZone::Neutral) => Color::Grey,
        None => Color::DarkGrey,
    }
}

// Gains in green, losses in red.
fn pct_cell(value: f64) -> Cell {
    let color = if value < 0.0 { Color::Red } else { Color::Green };
    Cell::new(format!("{:.2}%", value))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

pub fn rsi_table(report: &AnalysisReport) -> Table {
    let mut table = base_table();
    table.set_header(header(&["#", "Asset", "RSI", "Zone"]));

    for (rank, r) in report.reports.iter().enumerate() {
        let color = zone_color(r.rsi_zone);
        let rsi = r.rsi.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v));
        let zone = r.rsi_zone.map_or("-", RsiZone::label);
        table.add_row(vec![
            Cell::new(rank + 1).fg(Color::DarkGrey),
            Cell::new(&r.symbol).fg(Color::Cyan),
            Cell::new(rsi).fg(color).set_alignment(CellAlignment::Right),
            Cell::new(zone).fg(color).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn deviation_table(report: &AnalysisReport) -> Table {
    let mut table = base_table();
    table.set_header(header(&[
        "#",
        "Asset",
        "Last Close",
        "Series Max",
        "Series Min",
        "From Max (%)",
        "From Min (%)",
    ]));

    for (rank, r) in report.reports.iter().enumerate() {
        let mut row = vec![
            Cell::new(rank + 1).fg(Color::DarkGrey),
            Cell::new(&r.symbol).fg(Color::Cyan),
        ];
        match &r.deviation {
            Some(d) => row.extend([
                Cell::new(format!("{:.2}", d.latest_price)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.2}", d.global_max)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.2}", d.global_min)).set_alignment(CellAlignment::Right),
                pct_cell(d.deviation_from_max),
                pct_cell(d.deviation_from_min),
            ]),
            None => row.extend((0..5).map(|_| {
                Cell::new("N/A")
                    .fg(Color::DarkGrey)
                    .set_alignment(CellAlignment::Right)
            })),
        }
        table.add_row(row);
    }
    table
}

pub fn failures_table(report: &AnalysisReport) -> Option<Table> {
    if report.failures.is_empty() {
        return None;
    }
    let mut table = base_table();
    table.set_header(header(&["Asset", "Reason"]));
    for f in &report.failures {
        table.add_row(vec![
            Cell::new(&f.symbol).fg(Color::Yellow),
            Cell::new(&f.reason).fg(Color::DarkGrey),
        ]);
    }
    Some(table)
}

pub fn print(report: &AnalysisReport) {
    if report.reports.is_empty() {
        println!("No data found.");
    } else {
        let title = format!(
            "(Data taken at {} UTC)",
            report.generated_at.format("%d-%m-%Y %H:%M:%S")
        );
        println!("\n{}\n{}", title, rsi_table(report));
        println!("\n{}", deviation_table(report));
    }
    if let Some(table) = failures_table(report) {
        println!("\nSkipped symbols:\n{}", table);
    }
}
