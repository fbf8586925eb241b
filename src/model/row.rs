use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

/// One quoted option contract at a point in time.
///
/// Column names follow the fetched chain format so a row file round-trips
/// through every stage. The trailing fields are derived: each is `None`
/// until the stage that owns it has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRow {
    /// Uppercase symbol. Filled from the ticker directory when the file
    /// has no `ticker` column.
    #[serde(default)]
    pub ticker: String,
    #[serde(rename = "contractSymbol", default)]
    pub contract_symbol: Option<String>,
    #[serde(rename = "type", default)]
    pub option_type: Option<OptionType>,
    /// Expiration as received. Parsed by the tenor stage.
    pub expiration: String,
    pub strike: f64,
    #[serde(rename = "lastTradeDate", default)]
    pub last_trade_date: Option<String>,
    #[serde(rename = "lastPrice", default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(rename = "percentChange", default)]
    pub percent_change: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(rename = "openInterest", default)]
    pub open_interest: Option<f64>,
    #[serde(rename = "impliedVolatility", default)]
    pub implied_volatility: Option<f64>,
    #[serde(rename = "inTheMoney", default)]
    pub in_the_money: Option<String>,
    #[serde(rename = "contractSize", default)]
    pub contract_size: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub snap_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "whole_days")]
    pub tenor_days: Option<i64>,
    #[serde(default)]
    pub spot_price: Option<f64>,
    #[serde(default)]
    pub relative_strike: Option<f64>,
    #[serde(default, deserialize_with = "whole_days")]
    pub max_tenor_for_strike: Option<i64>,
}

impl OptionRow {
    /// A bare row with only the required fields set.
    pub fn new(ticker: &str, expiration: &str, strike: f64) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            contract_symbol: None,
            option_type: None,
            expiration: expiration.to_string(),
            strike,
            last_trade_date: None,
            last_price: None,
            bid: None,
            ask: None,
            change: None,
            percent_change: None,
            volume: None,
            open_interest: None,
            implied_volatility: None,
            in_the_money: None,
            contract_size: None,
            currency: None,
            snap_date: None,
            tenor_days: None,
            spot_price: None,
            relative_strike: None,
            max_tenor_for_strike: None,
        }
    }

    /// Short human-readable handle for log lines.
    pub fn describe(&self) -> String {
        match &self.contract_symbol {
            Some(symbol) => symbol.clone(),
            None => format!("{} {} @ {}", self.ticker, self.expiration, self.strike),
        }
    }
}

/// Day counts written by spreadsheet tooling often come back as `30.0`.
/// Accept any integral number, reject fractions.
fn whole_days<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else { return Ok(None) };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(days) = trimmed.parse::<i64>() {
        return Ok(Some(days));
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        _ => Err(serde::de::Error::custom(format!(
            "expected a whole number of days, got `{trimmed}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &str) -> Vec<Result<OptionRow, csv::Error>> {
        csv::Reader::from_reader(data.as_bytes())
            .deserialize()
            .collect()
    }

    #[test]
    fn test_reads_fetched_chain_columns() {
        let rows = read(
            "contractSymbol,type,expiration,strike,lastPrice,volume,openInterest,inTheMoney\n\
             AAPL250117C00100000,call,2025-01-17,100.0,12.5,,42,True\n",
        );
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.option_type, Some(OptionType::Call));
        assert_eq!(row.expiration, "2025-01-17");
        assert_eq!(row.strike, 100.0);
        assert_eq!(row.volume, None);
        assert_eq!(row.open_interest, Some(42.0));
        assert_eq!(row.in_the_money.as_deref(), Some("True"));
        assert!(row.ticker.is_empty());
        assert_eq!(row.tenor_days, None);
    }

    #[test]
    fn test_tenor_accepts_integral_floats() {
        let rows = read("expiration,strike,tenor_days,max_tenor_for_strike\n2025-01-17,100,30.0,45\n");
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.tenor_days, Some(30));
        assert_eq!(row.max_tenor_for_strike, Some(45));
    }

    #[test]
    fn test_fractional_tenor_is_rejected() {
        let rows = read("expiration,strike,tenor_days\n2025-01-17,100,30.5\n");
        assert!(rows[0].is_err());
    }

    #[test]
    fn test_unknown_option_type_is_rejected() {
        let rows = read("type,expiration,strike\nstraddle,2025-01-17,100\n");
        assert!(rows[0].is_err());
    }

    #[test]
    fn test_round_trip_keeps_derived_columns() {
        let mut row = OptionRow::new("aapl", "2025-01-17", 125.0);
        row.snap_date = NaiveDate::from_ymd_opt(2025, 1, 7);
        row.tenor_days = Some(10);
        row.spot_price = Some(250.0);
        row.relative_strike = Some(50.0);
        row.max_tenor_for_strike = Some(10);

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.serialize(&row).unwrap();
        let bytes = wtr.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("2025-01-07"));

        let back = read(&text);
        assert_eq!(back[0].as_ref().unwrap(), &row);
    }
}
