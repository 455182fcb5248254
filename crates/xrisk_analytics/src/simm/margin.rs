//! Nested sum-of-squares margin within a bucket and across buckets.

use std::collections::BTreeMap;

use super::configuration::RiskTypeConfig;
use super::crif::CrifRecord;
use crate::error::SimmError;

#[derive(Debug, Clone, Copy, Default)]
struct QualifierAggregate {
    k: f64,
    ws: f64,
    cr: f64,
}

/// Margin of one bucket before the square root, with the bucket's net
/// weighted sensitivity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BucketAggregate {
    /// `Σ_q K_q² + Σ_{q≠r} S_q S_r ρ g_qr`, floored at zero
    pub margin: f64,
    /// `Σ_q WS_q`
    pub weighted_sensitivity: f64,
}

impl BucketAggregate {
    /// Bucket margin `K_b`.
    pub fn k(&self) -> f64 {
        self.margin.sqrt()
    }
}

fn qualifier_aggregate(
    records: &[&CrifRecord],
    rt: &RiskTypeConfig,
    risk_type: &str,
    bucket: &str,
) -> Result<QualifierAggregate, SimmError> {
    let weight = rt.weight(risk_type, bucket)?;
    let net: f64 = records.iter().map(|r| r.amount).sum();
    let cr = match rt.concentration_threshold(bucket) {
        Some(t) => (net.abs() / t).sqrt().max(1.0),
        None => 1.0,
    };
    let ws: Vec<f64> = records.iter().map(|r| weight * r.amount * cr).collect();
    let mut k2 = 0.0;
    for (a, wa) in records.iter().zip(&ws) {
        for (b, wb) in records.iter().zip(&ws) {
            k2 += rt.label1_correlation.get(&a.label1, &b.label1)
                * rt.label2_correlation.get(&a.label2, &b.label2)
                * wa
                * wb;
        }
    }
    Ok(QualifierAggregate {
        k: k2.max(0.0).sqrt(),
        ws: ws.iter().sum(),
        cr,
    })
}

/// Aggregates the records of one bucket of one risk type.
///
/// Per qualifier `q`: `CR_q = max(1, sqrt(|Σ s| / T))`, `ws_k = w s_k CR_q`
/// and `K_q² = Σ_{k,l} ρ¹_kl ρ²_kl ws_k ws_l`. Across qualifiers
/// `S_q = clamp(Σ_k ws_k, -K_q, K_q)` and `g = min(CR) / max(CR)`.
pub fn bucket_aggregate(
    records: &[&CrifRecord],
    rt: &RiskTypeConfig,
    risk_type: &str,
    bucket: &str,
) -> Result<BucketAggregate, SimmError> {
    let mut by_qualifier: BTreeMap<&str, Vec<&CrifRecord>> = BTreeMap::new();
    for r in records {
        by_qualifier.entry(r.qualifier.as_str()).or_default().push(*r);
    }
    let aggs = by_qualifier
        .values()
        .map(|rs| qualifier_aggregate(rs, rt, risk_type, bucket))
        .collect::<Result<Vec<_>, _>>()?;

    let mut margin = 0.0;
    for (i, a) in aggs.iter().enumerate() {
        margin += a.k * a.k;
        let sa = a.ws.clamp(-a.k, a.k);
        for (j, b) in aggs.iter().enumerate() {
            if i == j {
                continue;
            }
            let sb = b.ws.clamp(-b.k, b.k);
            let g = a.cr.min(b.cr) / a.cr.max(b.cr);
            margin += sa * sb * rt.qualifier_correlation * g;
        }
    }
    Ok(BucketAggregate {
        margin: margin.max(0.0),
        weighted_sensitivity: aggs.iter().map(|a| a.ws).sum(),
    })
}

/// Sum-of-squares margin of one bucket, see [`bucket_aggregate`].
///
/// # Examples
///
/// ```
/// use xrisk_analytics::simm::{generic_margin, CrifRecord, RiskTypeConfig};
///
/// let rt = RiskTypeConfig::flat("FX", 7.4);
/// let r = CrifRecord::new("NS", "Risk_FX", "USD", 1000.0);
/// let m = generic_margin(&[&r], &rt, "Risk_FX", "").unwrap();
/// assert!((m - (7.4f64 * 1000.0).powi(2)).abs() < 1e-6);
/// ```
pub fn generic_margin(records: &[&CrifRecord], rt: &RiskTypeConfig, risk_type: &str, bucket: &str) -> Result<f64, SimmError> {
    Ok(bucket_aggregate(records, rt, risk_type, bucket)?.margin)
}

/// Margin of one risk type over all its buckets.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskTypeMargin {
    /// `K_b` per bucket
    pub buckets: BTreeMap<String, f64>,
    /// Risk type margin
    pub margin: f64,
}

/// `sqrt(Σ_b K_b² + Σ_{b≠c} γ_bc S_b S_c)` over the non-residual buckets,
/// plus the residual bucket's `K` added linearly.
pub fn risk_type_margin(records: &[&CrifRecord], rt: &RiskTypeConfig, risk_type: &str) -> Result<RiskTypeMargin, SimmError> {
    let mut by_bucket: BTreeMap<&str, Vec<&CrifRecord>> = BTreeMap::new();
    for r in records {
        by_bucket.entry(r.bucket.as_str()).or_default().push(*r);
    }
    let mut out = RiskTypeMargin::default();
    let mut regular: Vec<(&str, f64, f64)> = Vec::new();
    let mut residual = 0.0;
    for (bucket, rs) in &by_bucket {
        let agg = bucket_aggregate(rs, rt, risk_type, bucket)?;
        let k = agg.k();
        out.buckets.insert(bucket.to_string(), k);
        if rt.residual_bucket.as_deref() == Some(*bucket) {
            residual += k;
        } else {
            regular.push((*bucket, k, agg.weighted_sensitivity.clamp(-k, k)));
        }
    }
    let mut total = 0.0;
    for (i, (b, kb, sb)) in regular.iter().enumerate() {
        total += kb * kb;
        for (j, (c, _, sc)) in regular.iter().enumerate() {
            if i != j {
                total += rt.bucket_correlation.get(b, c) * sb * sc;
            }
        }
    }
    out.margin = total.max(0.0).sqrt() + residual;
    Ok(out)
}
