use crate::error::{PelaError, Result};
use crate::models::WinnerResult;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M", "%Y-%m-%d %H:%M"];

lazy_static! {
    static ref AMOUNT: Regex = Regex::new(r"^(?:R\$\s*)?(\d{1,9})(?:[.,](\d{1,2}))?$")
        .expect("amount pattern is valid");
}

/// Reads a kickoff time typed by a player in the group's local time.
pub fn parse_local_datetime(input: &str, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let naive = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .ok_or_else(|| {
            PelaError::InvalidInput(format!("data '{}' deve estar no formato DD/MM/AAAA HH:MM", input))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| PelaError::InvalidInput(format!("data '{}' é ambígua", input)))
}

pub fn format_local(dt: &DateTime<Utc>, offset: FixedOffset) -> String {
    dt.with_timezone(&offset).format("%d/%m/%Y %H:%M").to_string()
}

/// Parses amounts such as `25`, `25,5`, `25.50` or `R$ 25,50` into cents.
pub fn parse_amount_cents(input: &str) -> Result<i64> {
    let invalid = || PelaError::InvalidInput(format!("valor '{}' inválido", input.trim()));
    let caps = AMOUNT.captures(input.trim()).ok_or_else(invalid)?;

    let reais: i64 = caps[1].parse().map_err(|_| invalid())?;
    let cents: i64 = match caps.get(2).map(|m| m.as_str()) {
        Some(frac) if frac.len() == 1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
        Some(frac) => frac.parse().map_err(|_| invalid())?,
        None => 0,
    };

    let total = reais * 100 + cents;
    if total == 0 {
        return Err(invalid());
    }
    Ok(total)
}

pub fn format_brl(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}R$ {},{:02}", sign, abs / 100, abs % 100)
}

pub fn winner_line(winner: Option<&WinnerResult>, empty: &str) -> String {
    match winner {
        Some(w) if w.vote_count == 1 => format!("**{}** (1 voto)", w.profile.full_name),
        Some(w) => format!("**{}** ({} votos)", w.profile.full_name, w.vote_count),
        None => empty.to_string(),
    }
}
