/// Parse a page range like "1,3-5" into sorted, deduplicated 1-based page
/// numbers, validated against `page_count`.
pub fn parse_page_range(input: &str, page_count: usize) -> Result<Vec<u32>, String> {
    let mut pages = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_page(start, page_count)?, parse_page(end, page_count)?),
            None => {
                let page = parse_page(part, page_count)?;
                (page, page)
            }
        };
        if start > end {
            return Err(format!("descending range: '{part}'"));
        }
        pages.extend(start..=end);
    }

    if pages.is_empty() {
        return Err(format!("no pages selected by '{input}'"));
    }
    pages.sort_unstable();
    pages.dedup();
    Ok(pages)
}

fn parse_page(text: &str, page_count: usize) -> Result<u32, String> {
    let text = text.trim();
    let page: u32 = text
        .parse()
        .map_err(|_| format!("invalid page number: '{text}'"))?;
    if page == 0 {
        return Err("page 0 is invalid (pages start at 1)".to_string());
    }
    if page as usize > page_count {
        return Err(format!(
            "page {page} exceeds document page count ({page_count})"
        ));
    }
    Ok(page)
}
