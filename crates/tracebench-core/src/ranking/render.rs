//! HTML table rendering of a [`Ranking`].

use std::fmt::Write;

use super::{Ranking, Tier};

/// Render the ranking as a standalone HTML page with one table row per
/// test case. Each valid cell shows `energy (#rank)` on its tier colour;
/// invalid cells are empty.
pub fn render_html(ranking: &Ranking) -> String {
    let mut out = String::new();
    out.push_str("<html>\n<head>\n<title>Engine comparison result</title>\n</head>\n<body>\n");
    out.push_str("<table border=\"1\" cellspacing=\"0\" cellpadding=\"2\">\n<tr>\n<th>model name</th>\n");
    for column in &ranking.columns {
        let _ = writeln!(out, "<th>{}</th>", escape(&column.name));
    }
    out.push_str("<th>best</th>\n</tr>\n");

    for row in &ranking.rows {
        out.push_str("<tr align=\"right\">\n");
        let _ = writeln!(out, "<td>{}</td>", escape(&row.test_case));
        for cell in &row.cells {
            match (cell.energy, cell.rank, ranking.color(cell.tier)) {
                (Some(energy), Some(rank), Some(color)) if cell.tier != Tier::Empty => {
                    let _ = writeln!(out, "<td bgcolor=\"{color}\">{energy} (#{rank})</td>");
                }
                _ => out.push_str("<td></td>\n"),
            }
        }
        match row.best {
            Some(best) => {
                let _ = writeln!(out, "<td>{best}</td>");
            }
            None => out.push_str("<td></td>\n"),
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
