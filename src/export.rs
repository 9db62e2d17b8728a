use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::history::HistorySummary;
use crate::prediction::{HistoryItem, outcome_label, result_label};

pub struct ExportReport {
    pub rows: usize,
}

/// Write the history to an `.xlsx` workbook: one sheet of items, one of
/// totals.
pub fn export_history(
    path: &Path,
    items: &[HistoryItem],
    summary: HistorySummary,
) -> Result<ExportReport> {
    let rows = history_rows(items);
    let totals = summary_rows(summary);

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Historial")?;
        write_rows(sheet, &rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Resumen")?;
        write_rows(sheet, &totals)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        rows: rows.len().saturating_sub(1),
    })
}

pub fn history_rows(items: &[HistoryItem]) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "ID".to_string(),
        "Partido".to_string(),
        "Liga".to_string(),
        "Fecha".to_string(),
        "Predicción".to_string(),
        "Local %".to_string(),
        "Empate %".to_string(),
        "Visitante %".to_string(),
        "Resultado".to_string(),
        "Razonamiento".to_string(),
    ]];
    for item in items {
        let p = &item.prediction;
        rows.push(vec![
            item.id.to_string(),
            p.match_label.clone(),
            p.league.clone(),
            p.kickoff.clone(),
            outcome_label(p.outcome).to_string(),
            p.probabilities.local.to_string(),
            p.probabilities.draw.to_string(),
            p.probabilities.visitor.to_string(),
            result_label(item.result).to_string(),
            p.rationale.clone(),
        ]);
    }
    rows
}

fn summary_rows(summary: HistorySummary) -> Vec<Vec<String>> {
    let accuracy = summary
        .accuracy()
        .map(|a| format!("{:.1}%", a * 100.0))
        .unwrap_or_else(|| "-".to_string());
    vec![
        vec!["Total".to_string(), summary.total().to_string()],
        vec!["Pendientes".to_string(), summary.pending.to_string()],
        vec!["Acertadas".to_string(), summary.correct.to_string()],
        vec!["Falladas".to_string(), summary.incorrect.to_string()],
        vec!["Acierto".to_string(), accuracy],
    ]
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::{Outcome, Prediction, Probabilities, ResultTag};

    fn item(id: u64, result: ResultTag) -> HistoryItem {
        HistoryItem {
            prediction: Prediction {
                match_label: "Ajax vs PSV".to_string(),
                league: "Eredivisie".to_string(),
                kickoff: "2026-10-19T18:00:00Z".to_string(),
                outcome: Outcome::Visitor,
                probabilities: Probabilities {
                    local: 35,
                    draw: 25,
                    visitor: 40,
                },
                rationale: "PSV lidera.".to_string(),
                home_logo: String::new(),
                away_logo: String::new(),
            },
            id,
            result,
        }
    }

    #[test]
    fn rows_have_header_and_one_line_per_item() {
        let rows = history_rows(&[item(1, ResultTag::Correct), item(2, ResultTag::Pending)]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][1], "Partido");
        assert_eq!(rows[1][4], "Visitante");
        assert_eq!(rows[1][8], "Acertada");
        assert_eq!(rows[2][8], "Pendiente");
        assert!(rows.iter().all(|r| r.len() == rows[0].len()));
    }

    #[test]
    fn summary_without_settled_items_has_no_accuracy() {
        let rows = summary_rows(HistorySummary {
            pending: 2,
            correct: 0,
            incorrect: 0,
        });
        assert_eq!(rows[0][1], "2");
        assert_eq!(rows[4][1], "-");
    }

    #[test]
    fn workbook_is_written_to_disk() {
        let path = std::env::temp_dir().join(format!(
            "prediction_desk_export_{}.xlsx",
            std::process::id()
        ));
        let report = export_history(
            &path,
            &[item(1, ResultTag::Incorrect)],
            HistorySummary {
                pending: 0,
                correct: 0,
                incorrect: 1,
            },
        )
        .unwrap();
        assert_eq!(report.rows, 1);
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
