//! Per-flight cargo selection.
//!
//! High and medium priority cargo are reserved first; low priority cargo
//! compete for the remaining space through a scored subset search:
//! exhaustive up to [`EXHAUSTIVE_SUBSET_LIMIT`] candidates, greedy by
//! revenue density with a 2-opt improvement pass beyond that. When the
//! reserved classes alone do not fit, the emergency override boards them
//! anyway (the priority guarantee outranks nominal capacity) and reports a
//! critical `capacity_breach` alert; low priority cargo get nothing on that
//! flight. Identical inputs always produce identical selections; ties break
//! on ascending cargo id.

use std::cmp::Ordering;

use tracing::debug;

use crate::config::KnapsackWeights;
use crate::domain::{Alert, AlertKind, Cargo, CargoId, Flight, FlightId, Priority, Severity};

/// Above this many low-priority candidates the subset search switches from
/// exhaustive enumeration to greedy + 2-opt.
pub const EXHAUSTIVE_SUBSET_LIMIT: usize = 12;

/// Utilization band rewarded by the subset score.
const BAND_LOW: f64 = 0.6;
const BAND_HIGH: f64 = 0.9;

/// Slack for floating-point capacity sums.
const FIT_EPSILON: f64 = 1e-9;

/// A cargo competing for space on one flight. `dwell_hours` is the ground
/// time the cargo spends before this leg in its chosen itinerary.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub cargo: &'a Cargo,
    pub dwell_hours: f64,
}

/// Outcome of the selection for one flight.
#[derive(Debug, Clone)]
pub struct FlightSelection {
    pub flight_id: FlightId,
    pub boarded: Vec<CargoId>,
    pub rejected: Vec<CargoId>,
    pub weight_used: f64,
    pub volume_used: f64,
    pub alerts: Vec<Alert>,
}

/// Utilization score of the tighter axis: 1.0 inside the 60–90% band,
/// falling off linearly to 0 at empty and at full.
pub fn utilization_score(weight_frac: f64, volume_frac: f64) -> f64 {
    let u = weight_frac.max(volume_frac);
    if (BAND_LOW..=BAND_HIGH).contains(&u) {
        1.0
    } else if u < BAND_LOW {
        u / BAND_LOW
    } else {
        ((1.0 - u) / (1.0 - BAND_HIGH)).max(0.0)
    }
}

/// Choose which candidates board `flight`.
pub fn select(
    flight: &Flight,
    candidates: &[Candidate<'_>],
    weights: &KnapsackWeights,
) -> FlightSelection {
    let mut ordered: Vec<&Candidate<'_>> = candidates.iter().collect();
    ordered.sort_by(|a, b| a.cargo.cargo_id.cmp(&b.cargo.cargo_id));

    let reserved: Vec<&Candidate<'_>> = ordered
        .iter()
        .copied()
        .filter(|c| c.cargo.priority.is_guaranteed())
        .collect();
    let low: Vec<&Candidate<'_>> = ordered
        .iter()
        .copied()
        .filter(|c| c.cargo.priority == Priority::Low)
        .collect();

    let reserved_weight: f64 = reserved.iter().map(|c| c.cargo.weight_kg).sum();
    let reserved_volume: f64 = reserved.iter().map(|c| c.cargo.volume_m3).sum();

    let fits = reserved_weight <= flight.weight_capacity_kg + FIT_EPSILON
        && reserved_volume <= flight.volume_capacity_m3 + FIT_EPSILON;

    if fits {
        let picked = select_low_subset(flight, reserved_weight, reserved_volume, &low, weights);
        let mut boarded: Vec<CargoId> = reserved
            .iter()
            .map(|c| c.cargo.cargo_id.clone())
            .collect();
        let mut weight_used = reserved_weight;
        let mut volume_used = reserved_volume;
        let mut rejected = Vec::new();
        for (i, candidate) in low.iter().enumerate() {
            if picked.contains(&i) {
                boarded.push(candidate.cargo.cargo_id.clone());
                weight_used += candidate.cargo.weight_kg;
                volume_used += candidate.cargo.volume_m3;
            } else {
                rejected.push(candidate.cargo.cargo_id.clone());
            }
        }
        boarded.sort();
        debug!(
            flight_id = %flight.flight_id,
            boarded = boarded.len(),
            rejected = rejected.len(),
            "flight selection"
        );
        FlightSelection {
            flight_id: flight.flight_id.clone(),
            boarded,
            rejected,
            weight_used,
            volume_used,
            alerts: Vec::new(),
        }
    } else {
        emergency_override(flight, &reserved, &low)
    }
}

/// The reserved classes do not fit: board every high, then every medium, in
/// revenue-density order, past nominal capacity if necessary. Low priority
/// cargo are excluded outright.
fn emergency_override(
    flight: &Flight,
    reserved: &[&Candidate<'_>],
    low: &[&Candidate<'_>],
) -> FlightSelection {
    let mut by_class: Vec<&Candidate<'_>> = reserved.to_vec();
    by_class.sort_by(|a, b| {
        a.cargo
            .priority
            .rank()
            .cmp(&b.cargo.priority.rank())
            .then_with(|| {
                b.cargo
                    .revenue_density()
                    .partial_cmp(&a.cargo.revenue_density())
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.cargo.cargo_id.cmp(&b.cargo.cargo_id))
    });

    let mut boarded = Vec::with_capacity(by_class.len());
    let mut weight_used = 0.0;
    let mut volume_used = 0.0;
    for candidate in &by_class {
        boarded.push(candidate.cargo.cargo_id.clone());
        weight_used += candidate.cargo.weight_kg;
        volume_used += candidate.cargo.volume_m3;
    }
    boarded.sort();

    let alert = Alert::new(
        AlertKind::CapacityBreach,
        Severity::Critical,
        format!(
            "emergency priority override on flight {}: high/medium cargo load {:.0} kg / {:.1} m3 against capacity {:.0} kg / {:.1} m3",
            flight.flight_id,
            weight_used,
            volume_used,
            flight.weight_capacity_kg,
            flight.volume_capacity_m3
        ),
    )
    .with_flight(flight.flight_id.clone());

    debug!(
        flight_id = %flight.flight_id,
        weight_used,
        volume_used,
        "emergency override engaged"
    );

    FlightSelection {
        flight_id: flight.flight_id.clone(),
        boarded,
        rejected: low.iter().map(|c| c.cargo.cargo_id.clone()).collect(),
        weight_used,
        volume_used,
        alerts: vec![alert],
    }
}

/// Pick the best-scoring low-priority subset that fits the residual space.
/// Returns indices into `low` (which is id-sorted).
fn select_low_subset(
    flight: &Flight,
    base_weight: f64,
    base_volume: f64,
    low: &[&Candidate<'_>],
    weights: &KnapsackWeights,
) -> Vec<usize> {
    if low.is_empty() {
        return Vec::new();
    }
    let residual_weight = flight.weight_capacity_kg - base_weight;
    let residual_volume = flight.volume_capacity_m3 - base_volume;

    if low.len() <= EXHAUSTIVE_SUBSET_LIMIT {
        exhaustive_subset(
            flight,
            base_weight,
            base_volume,
            residual_weight,
            residual_volume,
            low,
            weights,
        )
    } else {
        greedy_subset(
            flight,
            base_weight,
            base_volume,
            residual_weight,
            residual_volume,
            low,
            weights,
        )
    }
}

fn subset_score(
    flight: &Flight,
    base_weight: f64,
    base_volume: f64,
    low: &[&Candidate<'_>],
    picked: &[usize],
    weights: &KnapsackWeights,
) -> f64 {
    let mut weight = base_weight;
    let mut volume = base_volume;
    let mut density = 0.0;
    let mut priority = 0.0;
    let mut dwell = 0.0;
    for &i in picked {
        let candidate = low[i];
        weight += candidate.cargo.weight_kg;
        volume += candidate.cargo.volume_m3;
        density += candidate.cargo.revenue_density();
        priority += candidate.cargo.priority.weight();
        dwell += candidate.dwell_hours;
    }
    let utilization = utilization_score(
        weight / flight.weight_capacity_kg,
        volume / flight.volume_capacity_m3,
    );
    weights.density * density + weights.priority * priority + weights.utilization * utilization
        - weights.dwell * dwell
}

#[allow(clippy::too_many_arguments)]
fn exhaustive_subset(
    flight: &Flight,
    base_weight: f64,
    base_volume: f64,
    residual_weight: f64,
    residual_volume: f64,
    low: &[&Candidate<'_>],
    weights: &KnapsackWeights,
) -> Vec<usize> {
    let n = low.len();
    let mut best: Vec<usize> = Vec::new();
    let mut best_score = subset_score(flight, base_weight, base_volume, low, &[], weights);
    for mask in 1u32..(1 << n) {
        let mut weight = 0.0;
        let mut volume = 0.0;
        let mut picked = Vec::new();
        for (i, candidate) in low.iter().enumerate() {
            if mask & (1 << i) != 0 {
                weight += candidate.cargo.weight_kg;
                volume += candidate.cargo.volume_m3;
                picked.push(i);
            }
        }
        if weight > residual_weight + FIT_EPSILON || volume > residual_volume + FIT_EPSILON {
            continue;
        }
        let score = subset_score(flight, base_weight, base_volume, low, &picked, weights);
        if score > best_score {
            best_score = score;
            best = picked;
        }
    }
    best
}

#[allow(clippy::too_many_arguments)]
fn greedy_subset(
    flight: &Flight,
    base_weight: f64,
    base_volume: f64,
    residual_weight: f64,
    residual_volume: f64,
    low: &[&Candidate<'_>],
    weights: &KnapsackWeights,
) -> Vec<usize> {
    // Greedy fill by descending revenue density, then 2-opt swaps.
    let mut order: Vec<usize> = (0..low.len()).collect();
    order.sort_by(|&a, &b| {
        low[b]
            .cargo
            .revenue_density()
            .partial_cmp(&low[a].cargo.revenue_density())
            .unwrap_or(Ordering::Equal)
            .then_with(|| low[a].cargo.cargo_id.cmp(&low[b].cargo.cargo_id))
    });

    let mut picked: Vec<usize> = Vec::new();
    let mut weight = 0.0;
    let mut volume = 0.0;
    for &i in &order {
        let candidate = low[i];
        if weight + candidate.cargo.weight_kg <= residual_weight + FIT_EPSILON
            && volume + candidate.cargo.volume_m3 <= residual_volume + FIT_EPSILON
        {
            picked.push(i);
            weight += candidate.cargo.weight_kg;
            volume += candidate.cargo.volume_m3;
        }
    }

    let mut passes = 0;
    loop {
        let mut changed = false;
        let current = subset_score(flight, base_weight, base_volume, low, &picked, weights);

        'swap: for si in 0..picked.len() {
            for &j in &order {
                if picked.contains(&j) {
                    continue;
                }
                let out = low[picked[si]];
                let inn = low[j];
                let new_weight = weight - out.cargo.weight_kg + inn.cargo.weight_kg;
                let new_volume = volume - out.cargo.volume_m3 + inn.cargo.volume_m3;
                if new_weight > residual_weight + FIT_EPSILON
                    || new_volume > residual_volume + FIT_EPSILON
                {
                    continue;
                }
                let mut trial = picked.clone();
                trial[si] = j;
                let score = subset_score(flight, base_weight, base_volume, low, &trial, weights);
                if score > current + f64::EPSILON {
                    picked = trial;
                    weight = new_weight;
                    volume = new_volume;
                    changed = true;
                    break 'swap;
                }
            }
        }

        // A swap can open room for another add.
        for &j in &order {
            if picked.contains(&j) {
                continue;
            }
            let candidate = low[j];
            if weight + candidate.cargo.weight_kg <= residual_weight + FIT_EPSILON
                && volume + candidate.cargo.volume_m3 <= residual_volume + FIT_EPSILON
            {
                picked.push(j);
                weight += candidate.cargo.weight_kg;
                volume += candidate.cargo.volume_m3;
                changed = true;
            }
        }

        passes += 1;
        if !changed || passes > 512 {
            break;
        }
    }

    picked.sort();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn flight(cap_kg: f64, cap_m3: f64) -> Flight {
        Flight {
            flight_id: "F1".into(),
            origin: "DEL".into(),
            destination: "BOM".into(),
            departure: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            arrival: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            weight_capacity_kg: cap_kg,
            volume_capacity_m3: cap_m3,
            cost_per_kg: Decimal::from(10),
        }
    }

    fn cargo(id: &str, weight: f64, volume: f64, revenue: i64, priority: Priority) -> Cargo {
        Cargo {
            cargo_id: id.into(),
            origin: "DEL".into(),
            destination: "BOM".into(),
            weight_kg: weight,
            volume_m3: volume,
            revenue: Decimal::from(revenue),
            priority,
            perishable: false,
            max_transit_hours: 24.0,
            ready_time: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            due_by: Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap(),
            handling_cost_per_kg: Decimal::ZERO,
            sla_penalty_per_hour: Decimal::from(100),
        }
    }

    fn candidates(cargo: &[Cargo]) -> Vec<Candidate<'_>> {
        cargo
            .iter()
            .map(|c| Candidate {
                cargo: c,
                dwell_hours: 0.0,
            })
            .collect()
    }

    #[test]
    fn utilization_peaks_in_band() {
        assert_eq!(utilization_score(0.75, 0.2), 1.0);
        assert_eq!(utilization_score(0.6, 0.0), 1.0);
        assert_eq!(utilization_score(0.9, 0.0), 1.0);
        assert!(utilization_score(0.3, 0.0) < 1.0);
        assert!(utilization_score(1.0, 0.0) < f64::EPSILON);
        // The tighter axis governs.
        assert_eq!(utilization_score(0.1, 0.8), 1.0);
    }

    #[test]
    fn everything_boards_when_it_fits() {
        let f = flight(10_000.0, 50.0);
        let items = vec![
            cargo("H1", 1000.0, 4.0, 50_000, Priority::High),
            cargo("L1", 2000.0, 8.0, 40_000, Priority::Low),
            cargo("M1", 1500.0, 6.0, 45_000, Priority::Medium),
        ];
        let sel = select(&f, &candidates(&items), &KnapsackWeights::default());
        assert_eq!(sel.boarded, vec!["H1", "L1", "M1"]);
        assert!(sel.rejected.is_empty());
        assert!(sel.alerts.is_empty());
        assert_eq!(sel.weight_used, 4500.0);
    }

    #[test]
    fn oversubscription_keeps_priority_guarantee_and_breaches_capacity() {
        let f = flight(1000.0, 50.0);
        let items = vec![
            cargo("CH", 600.0, 2.0, 60_000, Priority::High),
            cargo("CM", 600.0, 2.0, 50_000, Priority::Medium),
            cargo("CL", 600.0, 2.0, 40_000, Priority::Low),
        ];
        let sel = select(&f, &candidates(&items), &KnapsackWeights::default());
        assert_eq!(sel.boarded, vec!["CH", "CM"]);
        assert_eq!(sel.rejected, vec!["CL"]);
        assert_eq!(sel.weight_used, 1200.0);
        assert_eq!(sel.alerts.len(), 1);
        assert_eq!(sel.alerts[0].kind, AlertKind::CapacityBreach);
        assert_eq!(sel.alerts[0].severity, Severity::Critical);
        assert_eq!(sel.alerts[0].flight_id.as_deref(), Some("F1"));
    }

    #[test]
    fn low_subset_lands_in_utilization_band() {
        let f = flight(1000.0, 10.0);
        let items = vec![
            cargo("A", 600.0, 3.0, 150_000, Priority::Low),
            cargo("B", 250.0, 2.0, 30_000, Priority::Low),
            cargo("C", 350.0, 2.0, 38_500, Priority::Low),
            cargo("D", 400.0, 2.0, 34_000, Priority::Low),
            cargo("E", 450.0, 2.0, 31_500, Priority::Low),
        ];
        let sel = select(&f, &candidates(&items), &KnapsackWeights::default());
        assert_eq!(sel.boarded, vec!["A", "B"]);
        let frac = sel.weight_used / f.weight_capacity_kg;
        assert!((0.6..=0.9).contains(&frac));
        assert!(sel.weight_used <= f.weight_capacity_kg);
        assert!(sel.volume_used <= f.volume_capacity_m3);
    }

    #[test]
    fn ties_break_on_ascending_cargo_id() {
        let f = flight(500.0, 10.0);
        let items = vec![
            cargo("L2", 400.0, 2.0, 40_000, Priority::Low),
            cargo("L1", 400.0, 2.0, 40_000, Priority::Low),
        ];
        let sel = select(&f, &candidates(&items), &KnapsackWeights::default());
        assert_eq!(sel.boarded, vec!["L1"]);
        assert_eq!(sel.rejected, vec!["L2"]);
    }

    #[test]
    fn greedy_path_handles_many_candidates() {
        let f = flight(5000.0, 100.0);
        let mut items = Vec::new();
        for i in 0..15 {
            // Densities 20..160, ids L00..L14.
            items.push(cargo(
                &format!("L{i:02}"),
                400.0,
                1.0,
                (i as i64 + 2) * 10 * 400,
                Priority::Low,
            ));
        }
        let sel = select(&f, &candidates(&items), &KnapsackWeights::default());
        // 12 of 15 fit by weight; the densest must be among them.
        assert!(sel.boarded.contains(&"L14".to_string()));
        assert!(sel.weight_used <= f.weight_capacity_kg);
        assert_eq!(sel.boarded.len() + sel.rejected.len(), 15);
    }

    #[test]
    fn identical_inputs_select_identically() {
        let f = flight(1000.0, 10.0);
        let items = vec![
            cargo("A", 600.0, 3.0, 150_000, Priority::Low),
            cargo("B", 250.0, 2.0, 30_000, Priority::Low),
            cargo("C", 350.0, 2.0, 38_500, Priority::Low),
        ];
        let first = select(&f, &candidates(&items), &KnapsackWeights::default());
        let second = select(&f, &candidates(&items), &KnapsackWeights::default());
        assert_eq!(first.boarded, second.boarded);
        assert_eq!(first.rejected, second.rejected);
    }
}
