//! Netting set exposure with collateral.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info};
use xrisk_core::market_data::curves::YieldCurve;
use xrisk_core::types::{Date, DayCountConvention};
use xrisk_sim::cube::{AggregationScenarioData, AggregationScenarioDataType, InMemoryCube, NpvCube};

use super::collateral::collateral_balance_path;
use super::profile::{bank_account_profiles, potential_future_exposure};
use crate::error::AggregationError;
use crate::portfolio::{CsaDetails, NettingSetId, PortfolioRef};

/// Settings shared by the exposure calculators.
#[derive(Clone, Debug, PartialEq)]
pub struct ExposureConfig {
    /// PFE quantile
    pub pfe_quantile: f64,
    /// Cube depth holding the NPV
    pub npv_depth: usize,
    /// Cube depth holding the close-out NPV, if the cube has one
    pub close_out_depth: Option<usize>,
    /// Collateralise the as-of NPV in full on CSA netting sets
    pub full_initial_collateralisation: bool,
    /// Currency of the cube values
    pub base_currency: String,
    /// Day counter for exposure times and collateral accruals
    pub day_counter: DayCountConvention,
    /// As-of FX spots (base per unit) for CSA currencies other than base
    pub t0_fx_spots: BTreeMap<String, f64>,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            pfe_quantile: 0.95,
            npv_depth: 0,
            close_out_depth: None,
            full_initial_collateralisation: false,
            base_currency: "EUR".to_string(),
            day_counter: DayCountConvention::Actual365Fixed,
            t0_fx_spots: BTreeMap::new(),
        }
    }
}

impl ExposureConfig {
    /// Default settings in `base_currency`.
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            base_currency: base_currency.into(),
            ..Self::default()
        }
    }

    /// Checks the quantile and the cube depths.
    pub fn validate(&self, cube_depth: usize) -> Result<(), AggregationError> {
        if !(0.0..=1.0).contains(&self.pfe_quantile) {
            return Err(AggregationError::config(
                "pfe_quantile",
                format!("{} is outside [0, 1]", self.pfe_quantile),
            ));
        }
        for (name, depth) in [("npv_depth", Some(self.npv_depth)), ("close_out_depth", self.close_out_depth)] {
            if let Some(d) = depth {
                if d >= cube_depth {
                    return Err(AggregationError::InputMismatch(format!(
                        "{name} {d} out of range (cube depth {cube_depth})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Depth whose values define the exposure.
    #[inline]
    pub fn exposure_depth(&self) -> usize {
        self.close_out_depth.unwrap_or(self.npv_depth)
    }

    /// Exposure times: 0 for the as-of date, then one per valuation date.
    pub fn times(&self, asof: Date, dates: &[Date]) -> Vec<f64> {
        std::iter::once(0.0)
            .chain(dates.iter().map(|d| self.day_counter.year_fraction(asof, *d)))
            .collect()
    }
}

/// Exposure profiles of one netting set.
///
/// Profiles have one entry for the as-of date followed by one per
/// valuation date. `epe`, `ene`, `pfe` and `expected_collateral` are
/// numeraire-deflated; `ee_b` and `eee_b` are undiscounted with the
/// as-of discount curve.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NettingSetExposure {
    /// Netting set id
    pub netting_set_id: NettingSetId,
    /// Exposure times in years
    pub times: Vec<f64>,
    /// Netted as-of NPV
    pub npv0: f64,
    /// Expected positive exposure
    pub epe: Vec<f64>,
    /// Expected negative exposure
    pub ene: Vec<f64>,
    /// Potential future exposure
    pub pfe: Vec<f64>,
    /// Expected collateral balance
    pub expected_collateral: Vec<f64>,
    /// Expected exposure under the bank account measure
    pub ee_b: Vec<f64>,
    /// Effective expected exposure (running max of `ee_b`)
    pub eee_b: Vec<f64>,
    /// One-year time average of `ee_b`
    pub epe_b: f64,
    /// One-year time average of `eee_b`
    pub eepe_b: f64,
    /// COLVA per period
    pub colva_increments: Vec<f64>,
    /// Collateral value adjustment
    pub colva: f64,
    /// Collateral floor value per period
    pub collateral_floor_increments: Vec<f64>,
    /// Value of the floor on the collateral compounding rate
    pub collateral_floor: f64,
}

/// Netted exposures plus the netted cube.
#[derive(Debug, Clone)]
pub struct NettedExposure {
    /// Exposure per netting set
    pub netting_sets: BTreeMap<NettingSetId, NettingSetExposure>,
    /// Deflated exposure net of variation margin per (netting set, date,
    /// sample), before initial margin; T0 holds the netted as-of NPV
    pub cube: InMemoryCube,
}

/// Nets a trade cube per netting set and applies CSA collateral.
///
/// Cube values are numeraire-deflated base currency amounts; collateral is
/// simulated on undeflated values in the CSA currency, converted with the
/// `FxSpot` scenario data when it differs from base. Held initial margin
/// on a CSA netting set reduces EPE and ENE separately, `max(e - im, 0)`
/// and `max(-e - im, 0)`; PFE and the netted cube exclude it.
pub struct NettedExposureCalculator<'a> {
    portfolio: &'a PortfolioRef,
    cube: &'a (dyn NpvCube + Sync),
    scenario_data: &'a AggregationScenarioData,
    discount: &'a dyn YieldCurve<f64>,
    config: &'a ExposureConfig,
}

struct NettingSetRun {
    exposure: NettingSetExposure,
    // [date][sample], deflated
    values: Vec<f64>,
}

impl<'a> NettedExposureCalculator<'a> {
    /// Binds the inputs. Call [`PostProcess`](super::PostProcess) for
    /// validated end-to-end runs.
    pub fn new(
        portfolio: &'a PortfolioRef,
        cube: &'a (dyn NpvCube + Sync),
        scenario_data: &'a AggregationScenarioData,
        discount: &'a dyn YieldCurve<f64>,
        config: &'a ExposureConfig,
    ) -> Self {
        Self {
            portfolio,
            cube,
            scenario_data,
            discount,
            config,
        }
    }

    /// Aggregates every active netting set in parallel.
    pub fn build(&self) -> Result<NettedExposure, AggregationError> {
        self.config.validate(self.cube.depth())?;
        let ids = self.portfolio.active_netting_sets();
        let runs = ids
            .par_iter()
            .map(|ns| self.aggregate(ns))
            .collect::<Result<Vec<_>, AggregationError>>()?;

        let samples = self.cube.samples();
        let mut cube = InMemoryCube::new(
            self.cube.asof(),
            ids.iter().map(|id| id.to_string()).collect(),
            self.cube.dates().to_vec(),
            samples,
            1,
        )?;
        let mut netting_sets = BTreeMap::new();
        for (i, run) in runs.into_iter().enumerate() {
            cube.set_t0(run.exposure.npv0, i, 0)?;
            for (k, chunk) in run.values.chunks(samples.max(1)).enumerate() {
                for (s, v) in chunk.iter().enumerate() {
                    cube.set(*v, i, k, s, 0)?;
                }
            }
            netting_sets.insert(run.exposure.netting_set_id.clone(), run.exposure);
        }
        info!(netting_sets = netting_sets.len(), "netted exposure built");
        Ok(NettedExposure { netting_sets, cube })
    }

    fn fx(&self, csa: &CsaDetails, date: usize, sample: usize) -> Result<f64, AggregationError> {
        if csa.currency() == self.config.base_currency {
            return Ok(1.0);
        }
        Ok(self
            .scenario_data
            .get(date, sample, AggregationScenarioDataType::FxSpot, csa.currency())?)
    }

    fn fx_t0(&self, csa: &CsaDetails) -> Result<f64, AggregationError> {
        if csa.currency() == self.config.base_currency {
            return Ok(1.0);
        }
        self.config
            .t0_fx_spots
            .get(csa.currency())
            .copied()
            .ok_or_else(|| AggregationError::config(csa.currency(), "no as-of FX spot for CSA currency"))
    }

    fn aggregate(&self, ns: &NettingSetId) -> Result<NettingSetRun, AggregationError> {
        let cube = self.cube;
        let cfg = self.config;
        let data = self.scenario_data;
        let asof = cube.asof();
        let dates = cube.dates();
        let (num_dates, samples) = (cube.num_dates(), cube.samples());

        let trades = self
            .portfolio
            .trades_in(ns)
            .iter()
            .map(|t| cube.index_of(t.as_str()))
            .collect::<Result<Vec<usize>, _>>()?;
        let npv0 = trades
            .iter()
            .map(|&i| cube.get_t0(i, cfg.npv_depth))
            .sum::<Result<f64, _>>()?;

        let csa = self.portfolio.netting_set(ns)?.csa();
        let balance = self.portfolio.balance(ns);
        // Held IM only counts under a CSA.
        let initial_margin = match csa {
            Some(_) => balance.map_or(0.0, |b| b.initial_margin),
            None => 0.0,
        };
        let fx0 = match csa {
            Some(c) => self.fx_t0(c)?,
            None => 1.0,
        };
        let initial_vm = match csa {
            Some(_) if cfg.full_initial_collateralisation => npv0 / fx0,
            _ => balance.map_or(0.0, |b| b.variation_margin),
        };
        let index = csa.and_then(|c| c.index()).filter(|i| {
            data.has(AggregationScenarioDataType::IndexFixing, i)
        });

        let mut epe = vec![0.0; num_dates + 1];
        let mut ene = vec![0.0; num_dates + 1];
        let mut collateral = vec![0.0; num_dates + 1];
        let mut colva = vec![0.0; num_dates + 1];
        let mut floor = vec![0.0; num_dates + 1];
        let mut values = vec![0.0; num_dates * samples];
        let mut balance0 = initial_vm * fx0;

        let mut npv_path = vec![0.0; num_dates];
        let mut exposure_path = vec![0.0; num_dates];
        let mut numeraire = vec![0.0; num_dates];
        let mut balances = vec![0.0; num_dates];
        let mut im = vec![0.0; num_dates];
        for s in 0..samples {
            for k in 0..num_dates {
                let n = data.get(k, s, AggregationScenarioDataType::Numeraire, "")?;
                numeraire[k] = n;
                let mut npv = 0.0;
                let mut close_out = 0.0;
                for &i in &trades {
                    npv += cube.get(i, k, s, cfg.npv_depth)?;
                    if let Some(d) = cfg.close_out_depth {
                        close_out += cube.get(i, k, s, d)?;
                    }
                }
                npv_path[k] = npv * n;
                exposure_path[k] = if cfg.close_out_depth.is_some() { close_out * n } else { npv * n };
            }

            if let Some(c) = csa {
                let fx = (0..num_dates).map(|k| self.fx(c, k, s)).collect::<Result<Vec<f64>, _>>()?;
                let csa_path: Vec<f64> = npv_path.iter().zip(&fx).map(|(v, f)| v / f).collect();
                let path = collateral_balance_path(c, asof, dates, npv0 / fx0, &csa_path, initial_vm);
                balance0 = path.t0 * fx0;
                for k in 0..num_dates {
                    balances[k] = path.at_dates[k] * fx[k];
                    im[k] = initial_margin * fx[k];
                }
            }

            let mut previous = asof;
            for k in 0..num_dates {
                let n = numeraire[k];
                let b = balances[k];
                let e = (exposure_path[k] - b) / n;
                let dim = im[k] / n;
                values[k * samples + s] = e;
                epe[k + 1] += (e - dim).max(0.0);
                ene[k + 1] += (-e - dim).max(0.0);
                collateral[k + 1] += b / n;

                if let Some(c) = csa {
                    let dcf = DayCountConvention::Actual365Fixed.year_fraction(previous, dates[k]);
                    let spread = if b >= 0.0 { c.collat_spread_rcv() } else { c.collat_spread_pay() };
                    colva[k + 1] -= b * spread * dcf / n;
                    let fixing = match index {
                        Some(name) => data.get(k, s, AggregationScenarioDataType::IndexFixing, name)?,
                        None => 0.0,
                    };
                    floor[k + 1] -= b * (spread - fixing).max(0.0) * dcf / n;
                }
                previous = dates[k];
            }
        }

        let inv = if samples > 0 { 1.0 / samples as f64 } else { 0.0 };
        for profile in [&mut epe, &mut ene, &mut collateral, &mut colva, &mut floor] {
            profile.iter_mut().skip(1).for_each(|x| *x *= inv);
        }
        let fully_collateralised = csa.is_some() && cfg.full_initial_collateralisation;
        if !fully_collateralised {
            epe[0] = npv0.max(0.0);
            ene[0] = (-npv0).max(0.0);
        }
        collateral[0] = if csa.is_some() { balance0 } else { 0.0 };

        let mut pfe = vec![0.0; num_dates + 1];
        pfe[0] = epe[0];
        for k in 0..num_dates {
            let mut column = values[k * samples..(k + 1) * samples].to_vec();
            pfe[k + 1] = potential_future_exposure(&mut column, cfg.pfe_quantile);
        }

        let times = cfg.times(asof, dates);
        let b = bank_account_profiles(&epe, &times, asof, dates, self.discount)?;
        let colva_total = colva.iter().sum();
        let floor_total = floor.iter().sum();
        debug!(netting_set = %ns, trades = trades.len(), epe_b = b.epe_b, "netting set aggregated");

        Ok(NettingSetRun {
            exposure: NettingSetExposure {
                netting_set_id: ns.clone(),
                times,
                npv0,
                epe,
                ene,
                pfe,
                expected_collateral: collateral,
                ee_b: b.ee_b,
                eee_b: b.eee_b,
                epe_b: b.epe_b,
                eepe_b: b.eepe_b,
                colva_increments: colva,
                colva: colva_total,
                collateral_floor_increments: floor,
                collateral_floor: floor_total,
            },
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{CalculationType, CollateralBalance, Counterparty, CreditParams, NettingSetDefinition};
    use approx::assert_relative_eq;
    use xrisk_core::market_data::curves::FlatCurve;

    fn asof() -> Date {
        Date::from_ymd(2025, 1, 2).unwrap()
    }

    /// Two trades in one netting set, two dates, four samples, numeraire 1.
    fn fixture(csa: Option<CsaDetails>) -> (PortfolioRef, InMemoryCube, AggregationScenarioData) {
        let mut p = PortfolioRef::new();
        p.add_counterparty(Counterparty::new("CP".into(), CreditParams::new(0.02, 0.6).unwrap()))
            .unwrap();
        let mut ns = NettingSetDefinition::new("NS".into(), "CP".into());
        if let Some(c) = csa {
            ns = ns.with_csa(c).unwrap();
        }
        p.add_netting_set(ns).unwrap();
        p.add_trade("T1".into(), "NS".into()).unwrap();
        p.add_trade("T2".into(), "NS".into()).unwrap();

        let dates = vec![asof().add_days(182).unwrap(), asof().add_days(365).unwrap()];
        let mut cube = InMemoryCube::new(asof(), vec!["T1".into(), "T2".into()], dates, 4, 1).unwrap();
        cube.set_t0(3.0, 0, 0).unwrap();
        cube.set_t0(-1.0, 1, 0).unwrap();
        let t1 = [[10.0, -10.0, 20.0, 0.0], [5.0, 5.0, -5.0, 15.0]];
        for k in 0..2 {
            for s in 0..4 {
                cube.set(t1[k][s], 0, k, s, 0).unwrap();
                cube.set(-2.0, 1, k, s, 0).unwrap();
            }
        }
        let mut data = AggregationScenarioData::new(2, 4);
        for k in 0..2 {
            for s in 0..4 {
                data.set(k, s, 1.0, AggregationScenarioDataType::Numeraire, "").unwrap();
            }
        }
        (p, cube, data)
    }

    #[test]
    fn test_uncollateralised_profiles() {
        let (p, cube, data) = fixture(None);
        let curve = FlatCurve::new(0.0);
        let config = ExposureConfig::new("EUR");
        let out = NettedExposureCalculator::new(&p, &cube, &data, &curve, &config)
            .build()
            .unwrap();
        let ns = &out.netting_sets[&NettingSetId::new("NS")];
        assert_eq!(ns.epe.len(), 3);
        assert_relative_eq!(ns.npv0, 2.0);
        assert_relative_eq!(ns.epe[0], 2.0);
        // date 0 netted: 8, -12, 18, -2
        assert_relative_eq!(ns.epe[1], 26.0 / 4.0);
        assert_relative_eq!(ns.ene[1], 14.0 / 4.0);
        // sorted -12, -2, 8, 18; index floor(0.95 * 3 + 0.5) = 3
        assert_relative_eq!(ns.pfe[1], 18.0);
        assert_relative_eq!(out.cube.get(0, 0, 1, 0).unwrap(), -12.0);
        assert_relative_eq!(out.cube.get_t0(0, 0).unwrap(), 2.0);
        assert_eq!(ns.colva, 0.0);
    }

    #[test]
    fn test_no_lag_zero_threshold_csa_removes_exposure() {
        let csa = CsaDetails::new("EUR").with_calculation_type(CalculationType::NoLag);
        let (mut p, cube, data) = fixture(Some(csa));
        p.add_balance(CollateralBalance {
            netting_set_id: "NS".into(),
            variation_margin: 0.0,
            initial_margin: 0.0,
        })
        .unwrap();
        let curve = FlatCurve::new(0.0);
        let config = ExposureConfig::new("EUR");
        let out = NettedExposureCalculator::new(&p, &cube, &data, &curve, &config)
            .build()
            .unwrap();
        let ns = &out.netting_sets[&NettingSetId::new("NS")];
        assert_relative_eq!(ns.epe[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(ns.epe[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(ns.expected_collateral[0], 2.0);
    }

    fn held_im(p: &mut PortfolioRef, initial_margin: f64) {
        p.add_balance(CollateralBalance {
            netting_set_id: "NS".into(),
            variation_margin: 0.0,
            initial_margin,
        })
        .unwrap();
    }

    #[test]
    fn test_initial_margin_reduces_both_sides() {
        let csa = CsaDetails::new("EUR")
            .with_calculation_type(CalculationType::NoLag)
            .with_thresholds(1e9, 1e9);
        let (mut p, cube, data) = fixture(Some(csa));
        held_im(&mut p, 5.0);
        let curve = FlatCurve::new(0.0);
        let config = ExposureConfig::new("EUR");
        let out = NettedExposureCalculator::new(&p, &cube, &data, &curve, &config)
            .build()
            .unwrap();
        let ns = &out.netting_sets[&NettingSetId::new("NS")];
        // date 0 netted: 8, -12, 18, -2 with IM 5
        assert_relative_eq!(ns.epe[1], (3.0 + 13.0) / 4.0, epsilon = 1e-12);
        assert_relative_eq!(ns.ene[1], 7.0 / 4.0, epsilon = 1e-12);
        assert!(ns.ene[1] <= 14.0 / 4.0);
        // PFE and the netted cube are before IM
        assert_relative_eq!(ns.pfe[1], 18.0);
        assert_relative_eq!(out.cube.get(0, 0, 1, 0).unwrap(), -12.0);
    }

    #[test]
    fn test_initial_margin_ignored_without_csa() {
        let (mut p, cube, data) = fixture(None);
        held_im(&mut p, 100.0);
        let curve = FlatCurve::new(0.0);
        let config = ExposureConfig::new("EUR");
        let out = NettedExposureCalculator::new(&p, &cube, &data, &curve, &config)
            .build()
            .unwrap();
        let ns = &out.netting_sets[&NettingSetId::new("NS")];
        assert_relative_eq!(ns.epe[1], 26.0 / 4.0);
        assert_relative_eq!(ns.ene[1], 14.0 / 4.0);
    }

    #[test]
    fn test_initial_margin_converted_from_csa_currency() {
        let csa = CsaDetails::new("USD")
            .with_calculation_type(CalculationType::NoLag)
            .with_thresholds(1e9, 1e9);
        let (mut p, cube, mut data) = fixture(Some(csa));
        held_im(&mut p, 5.0);
        for k in 0..2 {
            for s in 0..4 {
                data.set(k, s, 2.0, AggregationScenarioDataType::FxSpot, "USD").unwrap();
            }
        }
        let curve = FlatCurve::new(0.0);
        let mut config = ExposureConfig::new("EUR");
        config.t0_fx_spots.insert("USD".to_string(), 2.0);
        let out = NettedExposureCalculator::new(&p, &cube, &data, &curve, &config)
            .build()
            .unwrap();
        let ns = &out.netting_sets[&NettingSetId::new("NS")];
        // IM of 5 USD is 10 in base
        assert_relative_eq!(ns.epe[1], 8.0 / 4.0, epsilon = 1e-12);
        assert_relative_eq!(ns.ene[1], 2.0 / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_collateral_spread_produces_colva() {
        let csa = CsaDetails::new("EUR")
            .with_calculation_type(CalculationType::NoLag)
            .with_collateral_spreads(0.01, 0.01);
        let (p, cube, data) = fixture(Some(csa));
        let curve = FlatCurve::new(0.0);
        let config = ExposureConfig::new("EUR");
        let out = NettedExposureCalculator::new(&p, &cube, &data, &curve, &config)
            .build()
            .unwrap();
        let ns = &out.netting_sets[&NettingSetId::new("NS")];
        // mean balance at date 0 is 3, at date 1 is 3; dcf 182 and 183 days
        let expected = -(3.0 * 0.01 * 182.0 / 365.0 + 3.0 * 0.01 * 183.0 / 365.0);
        assert_relative_eq!(ns.colva, expected, epsilon = 1e-12);
        assert!(ns.collateral_floor < 0.0);
    }

    #[test]
    fn test_missing_numeraire_is_an_error() {
        let (p, cube, _) = fixture(None);
        let data = AggregationScenarioData::new(2, 4);
        let curve = FlatCurve::new(0.0);
        let config = ExposureConfig::new("EUR");
        assert!(NettedExposureCalculator::new(&p, &cube, &data, &curve, &config)
            .build()
            .is_err());
    }

    #[test]
    fn test_depth_out_of_range_rejected() {
        let config = ExposureConfig {
            close_out_depth: Some(1),
            ..ExposureConfig::new("EUR")
        };
        assert!(config.validate(1).is_err());
        assert!(config.validate(2).is_ok());
    }
}
