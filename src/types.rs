use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Extracted tables keyed by the section heading they were found under.
pub type Panels = BTreeMap<String, Table>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Row {
    pub index: String,
    pub values: Vec<String>,
}

/// An HTML table with its first column lifted out as the row index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub index_name: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }

    /// (rows, columns), not counting the index column.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn row(&self, index: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.index == index)
    }

    pub fn get(&self, index: &str, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.row(index)
            .and_then(|r| r.values.get(col))
            .map(String::as_str)
    }

    pub fn column(&self, column: &str) -> Option<Vec<&str>> {
        let col = self.columns.iter().position(|c| c == column)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.values.get(col).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return writeln!(f, "(empty)");
        }

        let header: Vec<&str> = std::iter::once(self.index_name.as_deref().unwrap_or(""))
            .chain(self.columns.iter().map(String::as_str))
            .collect();
        let lines: Vec<Vec<&str>> = self
            .rows
            .iter()
            .map(|r| {
                std::iter::once(r.index.as_str())
                    .chain(r.values.iter().map(String::as_str))
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for line in &lines {
            for (i, cell) in line.iter().enumerate() {
                let w = cell.chars().count();
                match widths.get_mut(i) {
                    Some(slot) => *slot = (*slot).max(w),
                    None => widths.push(w),
                }
            }
        }

        let write_line = |f: &mut std::fmt::Formatter<'_>, cells: &[&str]| {
            let padded: Vec<String> = cells
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
                .collect();
            writeln!(f, "{}", padded.join(" | ").trim_end())
        };

        write_line(f, &header)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for line in &lines {
            write_line(f, line)?;
        }
        Ok(())
    }
}

/// Which fetched page a section lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageView {
    Overview,
    Functions,
}

impl PageView {
    pub fn sections(&self) -> &'static [Section] {
        match self {
            PageView::Overview => OVERVIEW_SECTIONS.as_slice(),
            PageView::Functions => FUNCTION_SECTIONS.as_slice(),
        }
    }
}

/// A named block on a feature page, located by matching its heading text.
#[derive(Debug)]
pub struct Section {
    pub name: &'static str,
    pub heading: Regex,
}

impl Section {
    fn literal(name: &'static str) -> Self {
        Self {
            name,
            heading: Regex::new(&regex::escape(name)).expect("escaped heading is a valid regex"),
        }
    }

    fn pattern(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            heading: Regex::new(pattern).expect("invalid regex: section heading"),
        }
    }
}

static OVERVIEW_SECTIONS: LazyLock<Vec<Section>> = LazyLock::new(|| {
    vec![
        Section::literal("Gene Feature Overview"),
        Section::literal("Cross-References"),
        Section::literal("Product"),
        Section::literal("Subcellular localization"),
        Section::literal("Pathogen Association Analysis"),
        Section::literal("Orthologs/Comparative Genomics"),
        Section::literal("Interactions"),
        // anchored so "Cross-References" is not picked up
        Section::pattern("References", r"^References"),
    ]
});

static FUNCTION_SECTIONS: LazyLock<Vec<Section>> = LazyLock::new(|| {
    vec![
        Section::literal("Gene Ontology"),
        Section::literal("Functional Classifications Manually Assigned by PseudoCAP"),
        Section::literal("Functional Predictions from Interpro"),
    ]
});
