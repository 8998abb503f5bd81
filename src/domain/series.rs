//! Indicator series factory.
//!
//! Resolves an [`Indicator`] plus bar data into one `f64` series aligned to
//! the primary table. Multi-output indicators pick a component, defaulting
//! to the primary line of each kind. No caching happens here; callers that
//! cache key by [`indicator_key`].

use crate::domain::error::RuleTraderError;
use crate::domain::indicator::{
    alligator::AlligatorParams, bollinger, calculate_alligator, calculate_bollinger,
    calculate_ema, calculate_macd, calculate_obv, calculate_rsi, calculate_sma,
    calculate_stochastic, macd, stochastic,
};
use crate::domain::ohlcv::{BarTable, MarketData};
use crate::domain::rule::{Indicator, IndicatorKind};

/// Build the series for `indicator`.
///
/// `bars` is the primary table; an indicator with a symbol override reads the
/// matching table from `market_data` instead. The result is right-aligned to
/// `bars.len()`: the last value always belongs to the primary table's last
/// bar, missing history is NaN.
pub fn create_indicator_series(
    indicator: &Indicator,
    bars: &BarTable,
    vix_bars: Option<&BarTable>,
    market_data: Option<&MarketData>,
) -> Result<Vec<f64>, RuleTraderError> {
    let table = resolve_bars(indicator, bars, market_data);
    let series = compute(indicator, table, vix_bars)?;
    Ok(align_right(series, bars.len()))
}

/// Table an indicator reads: exact symbol match, then upper-cased, then the
/// part before the first '.', else the primary table.
pub fn resolve_bars<'a>(
    indicator: &Indicator,
    bars: &'a BarTable,
    market_data: Option<&'a MarketData>,
) -> &'a BarTable {
    let (Some(symbol), Some(data)) = (indicator.symbol.as_deref(), market_data) else {
        return bars;
    };

    data.get(symbol)
        .or_else(|| data.get(&symbol.to_uppercase()))
        .or_else(|| {
            symbol
                .split_once('.')
                .and_then(|(base, _)| data.get(base))
        })
        .unwrap_or(bars)
}

/// Deterministic cache key:
/// `type_timeframe_source[_length][_symbol][_k=v...][_component]`.
pub fn indicator_key(indicator: &Indicator) -> String {
    let mut parts = vec![
        indicator.kind.as_str().to_string(),
        indicator.timeframe.to_string(),
        indicator.source.to_string(),
    ];
    if let Some(length) = indicator.length {
        parts.push(length.to_string());
    }
    if let Some(symbol) = &indicator.symbol {
        parts.push(symbol.clone());
    }
    for (name, value) in &indicator.params {
        parts.push(format!("{name}={value}"));
    }
    if let Some(component) = &indicator.component {
        parts.push(component.clone());
    }
    parts.join("_")
}

fn compute(
    indicator: &Indicator,
    table: &BarTable,
    vix_bars: Option<&BarTable>,
) -> Result<Vec<f64>, RuleTraderError> {
    let label = indicator.kind.to_string();
    let component = indicator.component.as_deref();

    let series = match indicator.kind {
        IndicatorKind::Ema => calculate_ema(
            &table.source_series(indicator.source),
            required_length(indicator)?,
        ),
        IndicatorKind::Sma => calculate_sma(
            &table.source_series(indicator.source),
            required_length(indicator)?,
        ),
        IndicatorKind::Rsi => calculate_rsi(
            &table.source_series(indicator.source),
            required_length(indicator)?,
        ),
        IndicatorKind::Price => table.source_series(indicator.source),
        IndicatorKind::Volume => table.volumes(),
        IndicatorKind::Vix => match vix_bars {
            Some(vix) if !vix.is_empty() => vix.closes(),
            _ => return Err(RuleTraderError::missing_input(&label, "VIX bar data")),
        },
        IndicatorKind::Time => {
            let timestamps = table
                .timestamps()
                .ok_or_else(|| RuleTraderError::missing_input(&label, "timestamped bars"))?;
            timestamps
                .iter()
                .map(|ts| ts.and_utc().timestamp() as f64)
                .collect()
        }
        IndicatorKind::Macd => {
            let lines = calculate_macd(
                &table.source_series(indicator.source),
                indicator.param_usize("fast_period", macd::DEFAULT_FAST),
                indicator.param_usize("slow_period", macd::DEFAULT_SLOW),
                indicator.param_usize("signal_period", macd::DEFAULT_SIGNAL),
            );
            match component {
                Some("signal") => lines.signal,
                Some("histogram") => lines.histogram,
                _ => lines.macd,
            }
        }
        IndicatorKind::Bollinger => {
            let period = indicator
                .length
                .unwrap_or_else(|| indicator.param_usize("period", bollinger::DEFAULT_PERIOD));
            let bands = calculate_bollinger(
                &table.source_series(indicator.source),
                period,
                indicator.param_f64("std_dev", bollinger::DEFAULT_MULTIPLIER),
            )
            .shifted(indicator.param_i64("offset", 0));
            match component {
                Some("lower") => bands.lower,
                Some("middle") => bands.middle,
                _ => bands.upper,
            }
        }
        IndicatorKind::Stochastic => {
            let lines = calculate_stochastic(
                &table.highs(),
                &table.lows(),
                &table.closes(),
                indicator.param_usize("k_period", stochastic::DEFAULT_K_PERIOD),
                indicator.param_usize("d_period", stochastic::DEFAULT_D_PERIOD),
                indicator.param_usize("smooth_k", stochastic::DEFAULT_SMOOTH_K),
            );
            match component {
                Some("d") => lines.d,
                _ => lines.k,
            }
        }
        IndicatorKind::Obv => calculate_obv(&table.closes(), &table.volumes()),
        IndicatorKind::Alligator => {
            let defaults = AlligatorParams::default();
            let params = AlligatorParams {
                jaw_period: indicator.param_usize("jaw_period", defaults.jaw_period),
                teeth_period: indicator.param_usize("teeth_period", defaults.teeth_period),
                lips_period: indicator.param_usize("lips_period", defaults.lips_period),
                jaw_shift: indicator.param_usize("jaw_shift", defaults.jaw_shift),
                teeth_shift: indicator.param_usize("teeth_shift", defaults.teeth_shift),
                lips_shift: indicator.param_usize("lips_shift", defaults.lips_shift),
            };
            let lines = calculate_alligator(&table.highs(), &table.lows(), &params);
            match component {
                Some("teeth") => lines.teeth,
                Some("lips") => lines.lips,
                _ => lines.jaw,
            }
        }
        IndicatorKind::DividendYield | IndicatorKind::PeRatio => vec![0.0; table.len()],
        IndicatorKind::RelativePerformance => vec![1.0; table.len()],
    };

    Ok(series)
}

fn required_length(indicator: &Indicator) -> Result<usize, RuleTraderError> {
    indicator
        .length
        .ok_or_else(|| RuleTraderError::missing_parameter(&indicator.kind.to_string(), "length"))
}

/// Keep the newest `len` values, padding missing history with NaN.
fn align_right(series: Vec<f64>, len: usize) -> Vec<f64> {
    match series.len() {
        n if n == len => series,
        n if n > len => series[n - len..].to_vec(),
        n => {
            let mut aligned = vec![f64::NAN; len - n];
            aligned.extend(series);
            aligned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::{OhlcvBar, PriceSource, Timeframe};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn table(symbol: &str, closes: &[f64]) -> BarTable {
        let bars = closes
            .iter()
            .map(|&c| OhlcvBar::new(c - 1.0, c + 1.0, c - 2.0, c, 1000.0))
            .collect();
        BarTable::new(symbol, Timeframe::M5, bars)
    }

    fn timed_table(closes: &[f64]) -> BarTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let mut t = table("SPY", closes);
        for (i, bar) in t.bars.iter_mut().enumerate() {
            bar.timestamp = Some(start + chrono::Duration::minutes(5 * i as i64));
        }
        t
    }

    #[test]
    fn ema_matches_math_library() {
        let bars = table("SPY", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let series = create_indicator_series(&Indicator::ema(3), &bars, None, None).unwrap();
        assert_eq!(series.len(), 5);
        assert!(series[1].is_nan());
        assert_relative_eq!(series[2], 2.0);
    }

    #[test]
    fn windowed_kinds_without_length_fail() {
        let bars = table("SPY", &[1.0, 2.0, 3.0]);
        for kind in [IndicatorKind::Ema, IndicatorKind::Sma, IndicatorKind::Rsi] {
            let err = create_indicator_series(&Indicator::new(kind), &bars, None, None);
            assert!(matches!(err, Err(RuleTraderError::MissingParameter { .. })));
        }
    }

    #[test]
    fn price_sources() {
        let bars = table("SPY", &[10.0, 20.0]);
        let hl2 = create_indicator_series(&Indicator::price(PriceSource::Hl2), &bars, None, None)
            .unwrap();
        // high = c + 1, low = c - 2
        assert_eq!(hl2, vec![9.5, 19.5]);
        let vol = create_indicator_series(
            &Indicator::new(IndicatorKind::Volume),
            &bars,
            None,
            None,
        )
        .unwrap();
        assert_eq!(vol, vec![1000.0, 1000.0]);
    }

    #[test]
    fn vix_requires_vix_table() {
        let bars = table("SPY", &[1.0, 2.0]);
        let vix = Indicator::new(IndicatorKind::Vix);
        let err = create_indicator_series(&vix, &bars, None, None);
        assert!(matches!(err, Err(RuleTraderError::MissingInput { .. })));

        let empty = table("VIX", &[]);
        assert!(create_indicator_series(&vix, &bars, Some(&empty), None).is_err());

        let vix_bars = table("VIX", &[18.0, 19.0]);
        let series = create_indicator_series(&vix, &bars, Some(&vix_bars), None).unwrap();
        assert_eq!(series, vec![18.0, 19.0]);
    }

    #[test]
    fn vix_is_right_aligned_to_primary() {
        let bars = table("SPY", &[1.0, 2.0, 3.0]);
        let long_vix = table("VIX", &[15.0, 16.0, 17.0, 18.0]);
        let series = create_indicator_series(
            &Indicator::new(IndicatorKind::Vix),
            &bars,
            Some(&long_vix),
            None,
        )
        .unwrap();
        assert_eq!(series, vec![16.0, 17.0, 18.0]);

        let short_vix = table("VIX", &[20.0]);
        let series = create_indicator_series(
            &Indicator::new(IndicatorKind::Vix),
            &bars,
            Some(&short_vix),
            None,
        )
        .unwrap();
        assert!(series[0].is_nan());
        assert!(series[1].is_nan());
        assert_eq!(series[2], 20.0);
    }

    #[test]
    fn time_requires_timestamps() {
        let time = Indicator::new(IndicatorKind::Time);
        let untimed = table("SPY", &[1.0]);
        assert!(matches!(
            create_indicator_series(&time, &untimed, None, None),
            Err(RuleTraderError::MissingInput { .. })
        ));

        let timed = timed_table(&[1.0, 2.0]);
        let series = create_indicator_series(&time, &timed, None, None).unwrap();
        assert_eq!(series[1] - series[0], 300.0);
    }

    #[test]
    fn multi_output_components_and_defaults() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).sin() * 5.0).collect();
        let bars = table("SPY", &closes);
        let get = |ind: Indicator| create_indicator_series(&ind, &bars, None, None).unwrap();

        let macd_default = get(Indicator::new(IndicatorKind::Macd));
        let macd_line = get(Indicator::new(IndicatorKind::Macd).with_component("macd"));
        let macd_signal = get(Indicator::new(IndicatorKind::Macd).with_component("signal"));
        assert_eq!(macd_default[59], macd_line[59]);
        assert!(macd_line[59].is_finite());
        assert!(macd_signal[59].is_nan());

        let upper = get(Indicator::new(IndicatorKind::Bollinger));
        let lower = get(Indicator::new(IndicatorKind::Bollinger).with_component("lower"));
        let middle = get(Indicator::new(IndicatorKind::Bollinger).with_component("middle"));
        assert!(upper[59] > middle[59] && middle[59] > lower[59]);

        let k = get(Indicator::new(IndicatorKind::Stochastic));
        let k_named = get(Indicator::new(IndicatorKind::Stochastic).with_component("k"));
        assert_eq!(k[59], k_named[59]);

        let jaw = get(Indicator::new(IndicatorKind::Alligator));
        let jaw_named = get(Indicator::new(IndicatorKind::Alligator).with_component("jaw"));
        assert_eq!(jaw[59], jaw_named[59]);
    }

    #[test]
    fn bollinger_length_overrides_period_param() {
        let closes: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let bars = table("SPY", &closes);
        let series = create_indicator_series(
            &Indicator::new(IndicatorKind::Bollinger)
                .with_length(3)
                .with_param("period", 8.0)
                .with_component("middle"),
            &bars,
            None,
            None,
        )
        .unwrap();
        assert!(series[1].is_nan());
        assert_relative_eq!(series[2], 1.0);
    }

    #[test]
    fn bollinger_offset_shifts_forward() {
        let closes: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let bars = table("SPY", &closes);
        let series = create_indicator_series(
            &Indicator::new(IndicatorKind::Bollinger)
                .with_length(2)
                .with_param("offset", 2.0)
                .with_component("middle"),
            &bars,
            None,
            None,
        )
        .unwrap();
        assert!(series[2].is_nan());
        assert_relative_eq!(series[3], 0.5);
    }

    #[test]
    fn static_placeholders() {
        let bars = table("SPY", &[1.0, 2.0]);
        let get = |kind| create_indicator_series(&Indicator::new(kind), &bars, None, None).unwrap();
        assert_eq!(get(IndicatorKind::DividendYield), vec![0.0, 0.0]);
        assert_eq!(get(IndicatorKind::PeRatio), vec![0.0, 0.0]);
        assert_eq!(get(IndicatorKind::RelativePerformance), vec![1.0, 1.0]);
    }

    #[test]
    fn symbol_resolution_order() {
        let primary = table("AAPL", &[1.0]);
        let mut data = MarketData::new();
        data.insert("SPY".into(), table("SPY", &[2.0]));
        data.insert("QQQ".into(), table("QQQ", &[3.0]));
        data.insert("RY".into(), table("RY", &[4.0]));

        let resolve = |symbol: &str| {
            let ind = Indicator::price(PriceSource::Close).with_symbol(symbol);
            resolve_bars(&ind, &primary, Some(&data)).symbol.clone()
        };
        assert_eq!(resolve("SPY"), "SPY");
        assert_eq!(resolve("qqq"), "QQQ");
        assert_eq!(resolve("RY.TO"), "RY");
        assert_eq!(resolve("MSFT"), "AAPL");

        let no_symbol = Indicator::price(PriceSource::Close);
        assert_eq!(resolve_bars(&no_symbol, &primary, Some(&data)).symbol, "AAPL");
        let with_symbol = Indicator::price(PriceSource::Close).with_symbol("SPY");
        assert_eq!(resolve_bars(&with_symbol, &primary, None).symbol, "AAPL");
    }

    #[test]
    fn indicator_key_is_deterministic() {
        let ind = Indicator::new(IndicatorKind::Macd)
            .with_timeframe(Timeframe::H1)
            .with_symbol("SPY")
            .with_param("slow_period", 30.0)
            .with_param("fast_period", 10.0)
            .with_component("signal");
        assert_eq!(
            indicator_key(&ind),
            "macd_1h_close_SPY_fast_period=10_slow_period=30_signal"
        );
        assert_eq!(indicator_key(&Indicator::ema(9)), "ema_5m_close_9");
    }
}
