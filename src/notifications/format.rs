/// Formats an amount in centavos as Brazilian reais, e.g. `250000` → `R$ 2.500,00`.
pub fn format_brl(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let cents = minor_units.unsigned_abs();
    let reais = (cents / 100).to_string();

    let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
    for (i, digit) in reais.chars().enumerate() {
        if i > 0 && (reais.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{}R$ {},{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(0), "R$ 0,00");
        assert_eq!(format_brl(5), "R$ 0,05");
        assert_eq!(format_brl(15000), "R$ 150,00");
        assert_eq!(format_brl(250000), "R$ 2.500,00");
        assert_eq!(format_brl(123456789), "R$ 1.234.567,89");
    }

    #[test]
    fn test_format_brl_negative() {
        assert_eq!(format_brl(-1050), "-R$ 10,50");
    }
}
