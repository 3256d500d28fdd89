use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of the admin order report: an order joined with its user and plan.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderReportRow {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub plan_id: Uuid,
    pub plan_name: Option<String>,
    pub description: Option<String>,
    pub duration_label: &'static str,
    pub features: Vec<String>,
    pub total_price: Option<Decimal>,
    pub discounted_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub is_discount_active: bool,
    pub is_plan_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_order_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub plan_name: Option<String>,
    pub user_name: Option<String>,
    pub start_on_or_after: Option<NaiveDate>,
    pub start_on_or_before: Option<NaiveDate>,
}

impl OrderFilter {
    pub fn matches(&self, row: &OrderReportRow) -> bool {
        if !contains_ignore_case(row.plan_name.as_deref().unwrap_or(""), self.plan_name.as_deref()) {
            return false;
        }
        if !contains_ignore_case(&row.user_name, self.user_name.as_deref()) {
            return false;
        }

        if self.start_on_or_after.is_none() && self.start_on_or_before.is_none() {
            return true;
        }
        let Some(start) = row.start_date else {
            return false;
        };
        self.start_on_or_after.is_none_or(|bound| start >= bound)
            && self.start_on_or_before.is_none_or(|bound| start <= bound)
    }
}

fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|needle| !needle.is_empty()) {
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportPage<T> {
    pub rows: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_rows: usize,
    pub total_pages: usize,
}

/// 1-based pagination. There is always at least one page; pages past the end are empty.
pub fn paginate<T: Clone>(rows: &[T], page: usize, per_page: usize) -> ReportPage<T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let total_rows = rows.len();
    let total_pages = total_rows.div_ceil(per_page).max(1);

    let start = (page - 1).saturating_mul(per_page);
    let page_rows = rows.iter().skip(start).take(per_page).cloned().collect();

    ReportPage {
        rows: page_rows,
        page,
        per_page,
        total_rows,
        total_pages,
    }
}
