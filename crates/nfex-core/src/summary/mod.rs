//! Narrative summaries of a report table.
//!
//! The table is grouped by issuer, rendered as plain text and embedded in a
//! Portuguese prompt. The language model itself sits behind
//! [`NarrativeSummarizer`], supplied by the caller.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::SummaryError;
use crate::report::ReportTable;

/// System prompt sent with every summary request.
pub const SYSTEM_PROMPT: &str =
    "Você é um contador sênior que explica resultados de NF-e em português simples.";

/// Per-issuer sums of a report table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuerTotals {
    pub issuer_name: String,
    pub invoice_total: Decimal,
    pub tax_total: Decimal,
}

/// Sum the per-document rows of `table` by issuer name.
///
/// The aggregate row is left out; groups are ordered by issuer name.
pub fn group_by_issuer(table: &ReportTable) -> Result<Vec<IssuerTotals>, SummaryError> {
    let mut groups: BTreeMap<&str, (Decimal, Decimal)> = BTreeMap::new();
    for record in table.records() {
        let name = record.issuer_name.as_str();
        let (invoice, tax) = groups.entry(name).or_default();
        *invoice = invoice
            .checked_add(record.invoice_total)
            .ok_or_else(|| SummaryError::Overflow(name.to_string()))?;
        *tax = tax
            .checked_add(record.tax_total)
            .ok_or_else(|| SummaryError::Overflow(name.to_string()))?;
    }

    Ok(groups
        .into_iter()
        .map(|(name, (invoice_total, tax_total))| IssuerTotals {
            issuer_name: name.to_string(),
            invoice_total,
            tax_total,
        })
        .collect())
}

/// Render grouped totals as an aligned text table.
fn render_groups(groups: &[IssuerTotals]) -> String {
    let totals: Vec<String> = groups.iter().map(|g| format!("{:.2}", g.invoice_total)).collect();
    let taxes: Vec<String> = groups.iter().map(|g| format!("{:.2}", g.tax_total)).collect();

    let name_width = groups
        .iter()
        .map(|g| g.issuer_name.chars().count())
        .chain(std::iter::once("nome_emit".len()))
        .max()
        .unwrap_or_default();
    let total_width = totals.iter().map(String::len).chain(std::iter::once("total_nf".len())).max().unwrap_or_default();
    let tax_width = taxes.iter().map(String::len).chain(std::iter::once("icms".len())).max().unwrap_or_default();

    let mut out = format!(
        "{:<name_width$}  {:>total_width$}  {:>tax_width$}",
        "nome_emit", "total_nf", "icms"
    );
    for ((group, total), tax) in groups.iter().zip(&totals).zip(&taxes) {
        out.push('\n');
        out.push_str(&format!(
            "{:<name_width$}  {:>total_width$}  {:>tax_width$}",
            group.issuer_name, total, tax
        ));
    }
    out
}

/// The two messages sent to the language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPrompt {
    pub system: String,
    pub user: String,
}

impl SummaryPrompt {
    /// Build the prompt for a report table.
    pub fn from_table(table: &ReportTable) -> Result<Self, SummaryError> {
        let groups = group_by_issuer(table)?;
        let user = format!(
            "Você recebeu uma tabela com colunas: nome_emit, total_nf, icms.\n\
             \n\
             Cada linha representa o total de notas fiscais para um emissor, no período analisado.\n\
             \n\
             DADOS:\n\
             {}\n\
             \n\
             Gere um resumo curto, em português, abordando:\n\
             - Faturamento total aproximado.\n\
             - Quem são os principais emissores (maiores valores).\n\
             - Comentário rápido sobre o ICMS (valores mais altos / concentração).\n\
             \n\
             Não devolva tabela nem código, apenas um texto corrido em 1 a 3 parágrafos.",
            render_groups(&groups)
        );

        Ok(Self {
            system: SYSTEM_PROMPT.to_string(),
            user,
        })
    }
}

/// A language-model backend that turns a prompt into prose.
#[async_trait]
pub trait NarrativeSummarizer: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Complete the prompt.
    async fn complete(&self, prompt: &SummaryPrompt) -> Result<String, SummaryError>;
}

/// Produce the narrative summary of a report table.
pub async fn summarize(
    summarizer: &dyn NarrativeSummarizer,
    table: &ReportTable,
) -> Result<String, SummaryError> {
    let prompt = SummaryPrompt::from_table(table)?;
    debug!(backend = summarizer.name(), prompt_len = prompt.user.len(), "requesting summary");

    let text = summarizer.complete(&prompt).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(SummaryError::EmptyResponse);
    }

    info!(backend = summarizer.name(), chars = text.chars().count(), "summary generated");
    Ok(text.to_string())
}
