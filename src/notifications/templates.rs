//! Message copy for transaction alerts and revenue summaries.

use rand::seq::SliceRandom;
use thiserror::Error;

use super::format::format_brl;
use super::types::{SummaryHour, SummaryStyle, TransactionKind, TransactionNotification};

/// Marker replaced by the formatted amount.
pub const AMOUNT_MARKER: &str = "{valor}";

const BRAND: &str = "Master Pagamentos";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("invalid template key: style {0} does not exist")]
    InvalidStyle(u8),

    #[error("invalid template key: no summary at {0}h")]
    InvalidHour(u32),
}

/// The fixed pool of summary templates for a style and hour.
pub fn summary_templates(style: SummaryStyle, hour: SummaryHour) -> &'static [&'static str; 5] {
    use SummaryHour::*;
    use SummaryStyle::*;

    match (style, hour) {
        (Creative, Morning) => &[
            "Comece seu dia no verde: sua operação já movimentou {valor} até agora.",
            "Acordou com saldo positivo? Hoje sua operação iniciou faturando {valor}.",
            "A manhã trouxe bons números: {valor} de movimentação até agora.",
            "{valor} faturados só pela manhã. Sua operação está no ritmo certo!",
            "Já conferiu os números? {valor} em transações até as 8h.",
        ],
        (Creative, Noon) => &[
            "Meio-dia no verde: sua operação já movimentou {valor} hoje.",
            "Almoço com saldo positivo? Sua operação já faturou {valor}.",
            "O dia está rendendo: {valor} de movimentação até agora.",
            "{valor} faturados só pela manhã. Continue assim!",
            "Já olhou os números? {valor} em transações até o meio-dia.",
        ],
        (Creative, Evening) => &[
            "Final do dia no verde: {valor} movimentados hoje!",
            "Encerrando com saldo positivo? Hoje faturou {valor}.",
            "O dia foi produtivo: {valor} em transações.",
            "{valor} faturados só nesta tarde. Resultado e tanto!",
            "Já fechou os números? {valor} até as 18h.",
        ],
        (Creative, Night) => &[
            "Noite no verde: {valor} movimentados hoje!",
            "Dormindo com saldo positivo? Hoje faturou {valor}.",
            "O dia fechou com bons números: {valor} em transações.",
            "{valor} faturados até agora. Amanhã tem mais!",
            "Já conferiu o fechamento? {valor} até as 23h.",
        ],
        (Casual, Morning) => &[
            "E aí, já viu a grana rodar hoje? Sua operação bateu {valor} até agora.",
            "Já tá no pique? Porque sua operação tá: {valor} movimentados antes das 8h.",
            "Seu gateway tá tinindo: {valor} rodaram pela sua operação logo cedo.",
            "Primeira olhada no painel e: BOOM, {valor} na conta.",
            "Começou cedo o fluxo! Já são {valor} rodando.",
        ],
        (Casual, Noon) => &[
            "E aí, já viu a grana dessa manhã? {valor} rodando!",
            "Tá no pique? Sua operação já mandou {valor} até o meio-dia.",
            "Seu gateway tá bombando: {valor} rodaram hoje.",
            "Olhada no painel e... {valor} na conta!",
            "Fluxo intenso! Já são {valor} no caixa.",
        ],
        (Casual, Evening) => &[
            "E aí, viu o balanço do dia? {valor} rodando!",
            "Tá finalizando com estilo? Sua operação mandou {valor}.",
            "Gateway encerrou o dia com {valor} na conta.",
            "Olhou o painel? {valor} de grana hoje!",
            "Fluxo do dia: {valor} no caixa.",
        ],
        (Casual, Night) => &[
            "E aí, fechou o dia com grana? {valor} rodando!",
            "Tá deitando com vitória? Sua operação mandou {valor}.",
            "Gateway fechou com {valor} na conta.",
            "Última olhada no painel: {valor} hoje!",
            "Fluxo total: {valor} no caixa.",
        ],
        (Formal, Morning) => &[
            "Atualização das 08h: sua operação já registrou {valor} em transações.",
            "Relatório parcial matinal: {valor} movimentados até o momento.",
            "Dados das 08h indicam uma movimentação de {valor}.",
            "O início do dia apresentou um volume de {valor} em sua operação.",
            "Primeira parcial do dia: {valor} em faturamento registrado.",
        ],
        (Formal, Noon) => &[
            "Atualização das 12h: {valor} em transações registradas.",
            "Relatório parcial: {valor} movimentados até o meio-dia.",
            "Dados das 12h indicam volume de {valor}.",
            "O período matinal apresentou {valor} em movimentação.",
            "Parcial do meio-dia: {valor} em faturamento.",
        ],
        (Formal, Evening) => &[
            "Atualização das 18h: {valor} em transações hoje.",
            "Relatório parcial: {valor} movimentados até agora.",
            "Dados das 18h indicam volume de {valor}.",
            "O período vespertino registrou {valor}.",
            "Parcial do fim do dia: {valor} em faturamento.",
        ],
        (Formal, Night) => &[
            "Atualização das 23h: {valor} em transações hoje.",
            "Relatório final: {valor} movimentados até agora.",
            "Dados das 23h indicam volume de {valor}.",
            "O período noturno registrou {valor}.",
            "Parcial final: {valor} em faturamento.",
        ],
    }
}

/// Render a summary message from raw backend keys.
///
/// Fails with [`TemplateError`] when `style_id` or `hour` has no template pool.
pub fn render(style_id: u8, hour: u32, amount_minor_units: i64) -> Result<String, TemplateError> {
    let style = SummaryStyle::try_from(style_id)?;
    let hour = SummaryHour::try_from(hour)?;
    Ok(render_summary(style, hour, amount_minor_units))
}

/// Pick a random template from the pool and substitute the formatted amount.
pub fn render_summary(style: SummaryStyle, hour: SummaryHour, amount_minor_units: i64) -> String {
    let pool = summary_templates(style, hour);
    let template = pool
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(pool[0]);

    template.replacen(AMOUNT_MARKER, &format_brl(amount_minor_units), 1)
}

pub fn summary_title(hour: SummaryHour) -> String {
    format!("Resumo {} - {}", hour, BRAND)
}

/// Title and body for a single transaction alert.
pub fn transaction_message(transaction: &TransactionNotification) -> (String, String) {
    let amount = format_brl(transaction.amount_minor_units);
    let method = transaction.payment_method.label();

    match &transaction.kind {
        TransactionKind::SaleGenerated => (
            "Venda Gerada".to_string(),
            format!("Nova venda de {} aguardando pagamento via {}", amount, method),
        ),
        TransactionKind::PaymentConfirmed => (
            "Pagamento Confirmado".to_string(),
            format!("Pagamento de {} confirmado via {}", amount, method),
        ),
        TransactionKind::Other(status) => (
            "Atualização de Venda".to_string(),
            format!("Venda de {} - Status: {}", amount, status),
        ),
    }
}
