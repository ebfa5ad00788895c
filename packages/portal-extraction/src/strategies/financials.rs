//! Billing statement extraction.
//!
//! The statement listing paginates with a fixed page size until a short
//! page or the reported total is reached. The endpoint still serializes
//! dates in the legacy `/Date(<epoch-ms>)/` form; every field of every row
//! is normalized before the rows leave the strategy.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::{ParseError, PortalError, PortalResult};
use crate::portal::dates;
use crate::types::{Row, Table};

use super::{Outcome, Strategy, StrategyContext};

/// Hard stop for runaway pagination.
const MAX_PAGES: usize = 1000;

pub struct StatementPages;

#[async_trait]
impl Strategy for StatementPages {
    fn name(&self) -> &str {
        "statement-pages"
    }

    async fn attempt(&self, ctx: &StrategyContext<'_>) -> PortalResult<Outcome> {
        let page_size = ctx.config.statement_page_size;
        let url = ctx.config.endpoints.url(&ctx.config.endpoints.statements_path);

        let mut table = Table::new();
        let mut total: Option<usize> = None;
        let mut page = 1;

        loop {
            let form = vec![
                ("page".to_string(), page.to_string()),
                ("pageSize".to_string(), page_size.to_string()),
            ];
            let response = match ctx.session.ajax_post_form(&url, form).await {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    let err = PortalError::Status {
                        status: response.status,
                        url: url.clone(),
                    };
                    if page == 1 {
                        return Err(err);
                    }
                    warn!(page, error = %err, "statement page failed, keeping earlier pages");
                    break;
                }
                Err(e) => {
                    if page == 1 {
                        return Err(e);
                    }
                    warn!(page, error = %e, "statement page failed, keeping earlier pages");
                    break;
                }
            };

            let (batch, reported_total) = match parse_statement_page(&response.body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    if page == 1 {
                        return Err(e.into());
                    }
                    warn!(page, error = %e, "statement page unparsable, keeping earlier pages");
                    break;
                }
            };
            total = total.or(reported_total);

            let batch_len = batch.len();
            for mut row in batch {
                dates::normalize_row(&mut row);
                table.push(row);
            }

            if batch_len < page_size {
                break;
            }
            if let Some(total) = total {
                if table.row_count() >= total {
                    break;
                }
            }
            page += 1;
            if page > MAX_PAGES {
                warn!(pages = MAX_PAGES, "statement pagination cap reached");
                break;
            }
        }

        if table.is_empty() {
            Ok(Outcome::NoData)
        } else {
            Ok(Outcome::Rows(table))
        }
    }
}

/// One page of the statement listing: the row array plus the total row
/// count when the portal reports one.
fn parse_statement_page(body: &str) -> Result<(Vec<Row>, Option<usize>), ParseError> {
    let value: Value = serde_json::from_str(body)?;

    let rows_value = if value.is_array() {
        &value
    } else {
        ["rows", "data", "statements", "items"]
            .iter()
            .find_map(|key| value.get(key))
            .ok_or_else(|| ParseError::UnexpectedShape {
                reason: "no statement row array".to_string(),
            })?
    };
    let array = rows_value
        .as_array()
        .ok_or_else(|| ParseError::UnexpectedShape {
            reason: "statement rows are not an array".to_string(),
        })?;

    let mut rows = Vec::with_capacity(array.len());
    for item in array {
        let object = item.as_object().ok_or_else(|| ParseError::UnexpectedShape {
            reason: "statement row is not an object".to_string(),
        })?;
        rows.push(object.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    }

    let total = ["total", "totalRows", "recordCount"]
        .iter()
        .find_map(|key| value.get(key))
        .and_then(Value::as_u64)
        .map(|n| n as usize);

    Ok((rows, total))
}
