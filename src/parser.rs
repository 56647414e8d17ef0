use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::types::{PageView, Panels, Row, Table};

/// Path fragment shared by every feature detail link on the site.
pub(crate) const FEATURE_LINK_PATH: &str = "/feature/show";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Missing element: {0}")]
    MissingElement(String),
    #[error("Table has no rows: {0}")]
    EmptyTable(String),
}

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn row_cells(row: ElementRef) -> Vec<(String, bool)> {
    let mut cells = Vec::new();
    for cell in row.children().filter_map(ElementRef::wrap) {
        let is_header = match cell.value().name() {
            "th" => true,
            "td" => false,
            _ => continue,
        };
        let text = normalize_whitespace(&elem_text(cell));
        let span = cell
            .value()
            .attr("colspan")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(1);
        for _ in 0..span {
            cells.push((text.clone(), is_header));
        }
    }
    cells
}

/// Parses a `<table>` element, using its first column as the row index.
///
/// The header comes from `<thead>` when present, otherwise from a leading row
/// made only of `<th>` cells. Without a header, columns are named by position
/// starting at "1" (the index column is position 0).
pub fn parse_table(table: ElementRef) -> Result<Table, ParseError> {
    let thead_row_sel = Selector::parse("thead tr").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();

    let mut header: Option<Vec<String>> = table
        .select(&thead_row_sel)
        .next()
        .map(|tr| row_cells(tr).into_iter().map(|(text, _)| text).collect());

    let mut body: Vec<Vec<String>> = Vec::new();
    for tr in table.select(&tr_sel) {
        if tr
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| a.value().name() == "thead")
        {
            continue;
        }

        let cells = row_cells(tr);
        if cells.is_empty() {
            continue;
        }

        if header.is_none() && body.is_empty() && cells.iter().all(|(_, is_header)| *is_header) {
            header = Some(cells.into_iter().map(|(text, _)| text).collect());
            continue;
        }

        body.push(cells.into_iter().map(|(text, _)| text).collect());
    }

    if body.is_empty() && header.as_ref().is_none_or(|h| h.is_empty()) {
        return Err(ParseError::EmptyTable("no header or data rows".to_string()));
    }

    let width = body
        .iter()
        .map(Vec::len)
        .chain(header.iter().map(Vec::len))
        .max()
        .unwrap_or(0)
        .max(1);

    let (index_name, columns) = match header {
        Some(mut h) => {
            h.resize(width, String::new());
            let index_name = Some(h.remove(0)).filter(|s| !s.is_empty());
            (index_name, h)
        }
        None => (None, (1..width).map(|i| i.to_string()).collect()),
    };

    let rows = body
        .into_iter()
        .map(|mut cells| {
            cells.resize(width, String::new());
            let index = cells.remove(0);
            Row {
                index,
                values: cells,
            }
        })
        .collect();

    Ok(Table {
        index_name,
        columns,
        rows,
    })
}

fn try_table_from_heading(document: &Html, heading: &Regex) -> Result<Table, ParseError> {
    let h3_sel = Selector::parse("h3").unwrap();
    let table_sel = Selector::parse("table").unwrap();

    let heading_elem = document
        .select(&h3_sel)
        .find(|h| heading.is_match(&normalize_whitespace(&elem_text(*h))))
        .ok_or_else(|| ParseError::MissingElement(format!("h3 matching '{}'", heading)))?;

    let next = heading_elem
        .next_siblings()
        .find_map(ElementRef::wrap)
        .ok_or_else(|| ParseError::MissingElement("element after heading".to_string()))?;

    let table = if next.value().name() == "table" {
        next
    } else {
        next.select(&table_sel).next().ok_or_else(|| {
            ParseError::MissingElement(format!("table in <{}> after heading", next.value().name()))
        })?
    };

    parse_table(table)
}

/// Finds the first `h3` whose text matches `heading` and parses the table that
/// follows it. Anything missing or malformed gives an empty table.
pub fn table_from_heading(document: &Html, name: &str, heading: &Regex) -> Table {
    match try_table_from_heading(document, heading) {
        Ok(table) => table,
        Err(e) => {
            log::warn!("No data found for '{}', returning empty table: {}", name, e);
            Table::default()
        }
    }
}

/// Extracts every section listed for `view` from a fetched feature page.
pub fn parse_sections(html: &str, view: PageView) -> Panels {
    let document = Html::parse_document(html);
    view.sections()
        .iter()
        .map(|section| {
            (
                section.name.to_string(),
                table_from_heading(&document, section.name, &section.heading),
            )
        })
        .collect()
}

/// Returns the href of the first link whose text contains `feature`,
/// compared case-insensitively. Links to feature pages are preferred over
/// navigation and strain links; a blank term matches nothing.
pub fn find_feature_link(html: &str, feature: &str) -> Option<String> {
    let needle = feature.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let document = Html::parse_document(html);
    let a_sel = Selector::parse("a[href]").unwrap();

    let matching: Vec<&str> = document
        .select(&a_sel)
        .filter(|a| {
            normalize_whitespace(&elem_text(*a))
                .to_lowercase()
                .contains(&needle)
        })
        .filter_map(|a| a.value().attr("href"))
        .collect();

    matching
        .iter()
        .find(|href| href.contains(FEATURE_LINK_PATH))
        .or_else(|| matching.first())
        .map(|href| href.to_string())
}

/// Distinct feature detail links on a search result page, in page order.
pub fn feature_page_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let a_sel = Selector::parse("a[href]").unwrap();

    let mut links: Vec<String> = Vec::new();
    for href in document
        .select(&a_sel)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains(FEATURE_LINK_PATH))
    {
        if !links.iter().any(|l| l == href) {
            links.push(href.to_string());
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn first_table(html: &str) -> Result<Table, ParseError> {
        let document = Html::parse_fragment(html);
        let sel = Selector::parse("table").unwrap();
        let table = document.select(&sel).next().expect("fixture has a table");
        parse_table(table)
    }

    fn heading(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[test]
    fn test_product_heading_two_by_two() {
        let html = r#"
            <html><body>
                <h3>Product</h3>
                <table>
                    <thead><tr><th>Name</th><th>Value</th></tr></thead>
                    <tbody>
                        <tr><td>Product Name</td><td>membrane protein</td></tr>
                        <tr><td>Evidence</td><td>predicted</td></tr>
                    </tbody>
                </table>
            </body></html>
        "#;
        let document = Html::parse_document(html);

        let table = table_from_heading(&document, "Product", &heading("Product"));

        assert_eq!(table.shape(), (2, 1));
        assert_eq!(table.index_name.as_deref(), Some("Name"));
        assert_eq!(table.columns, vec!["Value"]);
        assert_eq!(table.rows[0].index, "Product Name");
        assert_eq!(table.get("Evidence", "Value"), Some("predicted"));
    }

    #[test]
    fn test_missing_heading_gives_empty_table() {
        let html = "<html><body><h3>Product</h3><table><tr><td>a</td><td>b</td></tr></table></body></html>";
        let document = Html::parse_document(html);

        let table = table_from_heading(&document, "Interactions", &heading("Interactions"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_heading_without_table_gives_empty_table() {
        let html = "<html><body><h3>Interactions</h3><p>No interactions found.</p></body></html>";
        let document = Html::parse_document(html);

        let table = table_from_heading(&document, "Interactions", &heading("Interactions"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_table_nested_in_wrapper() {
        let html = r#"
            <html><body>
                <h3>Gene Ontology</h3>
                <div class="table-responsive">
                    <table><tr><td>GO:0016020</td><td>membrane</td></tr></table>
                </div>
            </body></html>
        "#;
        let document = Html::parse_document(html);

        let table = table_from_heading(&document, "Gene Ontology", &heading("Gene Ontology"));
        assert_eq!(table.shape(), (1, 1));
        assert_eq!(table.columns, vec!["1"]);
        assert_eq!(table.get("GO:0016020", "1"), Some("membrane"));
    }

    #[test]
    fn test_anchored_heading_skips_cross_references() {
        let html = r#"
            <html><body>
                <h3>Cross-References</h3>
                <table><tr><td>UniProt</td><td>C3K3H7</td></tr></table>
                <h3>References</h3>
                <table><tr><td>PMID</td><td>19432983</td></tr></table>
            </body></html>
        "#;
        let document = Html::parse_document(html);

        let table = table_from_heading(&document, "References", &heading("^References"));
        assert_eq!(table.rows[0].index, "PMID");

        let unanchored = table_from_heading(&document, "References", &heading("References"));
        assert_eq!(unanchored.rows[0].index, "UniProt");
    }

    #[test]
    fn test_parse_table_th_row_is_header() {
        let table = first_table(
            r#"<table>
                <tr><th>Locus Tag</th><th>Start</th><th>End</th></tr>
                <tr><td>PFLU_0916</td><td>1012345</td><td>1013766</td></tr>
            </table>"#,
        )
        .unwrap();

        assert_eq!(table.index_name.as_deref(), Some("Locus Tag"));
        assert_eq!(table.columns, vec!["Start", "End"]);
        assert_eq!(table.get("PFLU_0916", "End"), Some("1013766"));
    }

    #[test]
    fn test_parse_table_pads_short_rows_and_expands_colspan() {
        let table = first_table(
            r#"<table>
                <tr><td>Strand</td><td>+</td><td>forward</td></tr>
                <tr><td>Note</td></tr>
                <tr><td colspan="2">Span</td><td>x</td></tr>
            </table>"#,
        )
        .unwrap();

        assert_eq!(table.shape(), (3, 2));
        assert_eq!(table.rows[1].values, vec!["", ""]);
        assert_eq!(table.rows[2].index, "Span");
        assert_eq!(table.rows[2].values, vec!["Span", "x"]);
    }

    #[test]
    fn test_parse_table_empty_is_error() {
        assert!(matches!(
            first_table("<table></table>"),
            Err(ParseError::EmptyTable(_))
        ));
    }

    #[test]
    fn test_parse_overview_sections_from_fixture() {
        let html = fs::read_to_string("fixtures/feature_overview.html")
            .expect("Failed to read fixture");

        let panels = parse_sections(&html, PageView::Overview);

        assert_eq!(panels.len(), 8);
        let overview = &panels["Gene Feature Overview"];
        assert_eq!(overview.get("Locus Tag", "1"), Some("PFLU_0916"));
        assert_eq!(overview.get("Strand", "1"), Some("+"));

        let cross = &panels["Cross-References"];
        assert_eq!(cross.get("UniProtKB", "Accession"), Some("C3K3H7"));

        let references = &panels["References"];
        assert_eq!(references.shape().0, 2);
        assert!(references.row("19432983").is_some());

        assert_eq!(panels["Product"].shape(), (2, 1));
        assert!(panels["Interactions"].is_empty());
        assert!(panels["Pathogen Association Analysis"].is_empty());
    }

    #[test]
    fn test_parse_function_sections_from_fixture() {
        let html = fs::read_to_string("fixtures/feature_functions.html")
            .expect("Failed to read fixture");

        let panels = parse_sections(&html, PageView::Functions);

        assert_eq!(panels.len(), 3);
        let go = &panels["Gene Ontology"];
        assert_eq!(go.index_name.as_deref(), Some("Accession"));
        assert_eq!(go.get("GO:0016020", "GO Term"), Some("membrane"));

        let pseudocap = &panels["Functional Classifications Manually Assigned by PseudoCAP"];
        assert_eq!(pseudocap.shape(), (1, 1));

        assert!(panels["Functional Predictions from Interpro"].is_empty());
    }

    #[test]
    fn test_find_feature_link_case_insensitive() {
        let html = fs::read_to_string("fixtures/search_results.html")
            .expect("Failed to read fixture");

        let link = find_feature_link(&html, "pflu0916").expect("Should find the feature link");
        assert_eq!(link, "/feature/show/?id=1661770&view=overview");

        assert_eq!(find_feature_link(&html, "pflu9999"), None);
    }

    #[test]
    fn test_find_feature_link_blank_term_matches_nothing() {
        let html = fs::read_to_string("fixtures/search_results.html")
            .expect("Failed to read fixture");

        assert_eq!(find_feature_link(&html, ""), None);
        assert_eq!(find_feature_link(&html, "  \t"), None);
    }

    #[test]
    fn test_find_feature_link_prefers_feature_pages() {
        let html = r#"
            <a href="/">Home</a>
            <a href="/strain/show/?id=117">Pseudomonas fluorescens SBW25</a>
            <a href="/feature/show/?id=5">SBW25_RS04615</a>
        "#;
        assert_eq!(
            find_feature_link(html, "sbw25").as_deref(),
            Some("/feature/show/?id=5")
        );

        let html = r#"
            <a href="/strain/show/?id=117">Pseudomonas fluorescens SBW25</a>
            <a href="/feature/show/?id=5">PFLU0916</a>
        "#;
        assert_eq!(
            find_feature_link(html, "sbw25").as_deref(),
            Some("/strain/show/?id=117")
        );
    }

    #[test]
    fn test_feature_page_links_are_distinct() {
        let html = fs::read_to_string("fixtures/search_results.html")
            .expect("Failed to read fixture");

        let links = feature_page_links(&html);
        assert_eq!(links, vec!["/feature/show/?id=1661770&view=overview"]);

        let html = r#"
            <a href="/feature/show/?id=1">PFLU0001</a>
            <a href="/feature/show/?id=2">PFLU0002</a>
            <a href="/feature/show/?id=1">again</a>
            <a href="/strain/show/?id=9">SBW25</a>
        "#;
        assert_eq!(feature_page_links(html).len(), 2);
    }
}
