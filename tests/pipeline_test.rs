//! End-to-end planning scenarios over the full pipeline.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use aircargo_planner::domain::{
    AlertKind, Cargo, CargoStatus, ConnectionRule, Flight, Priority, Severity,
};
use aircargo_planner::{disruption, CancelFlag, Planner, PlannerConfig};

fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
}

fn flight(id: &str, from: &str, to: &str, dep: (u32, u32), arr: (u32, u32), cap_kg: f64) -> Flight {
    Flight {
        flight_id: id.into(),
        origin: from.into(),
        destination: to.into(),
        departure: ts(1, dep.0, dep.1),
        arrival: ts(1, arr.0, arr.1),
        weight_capacity_kg: cap_kg,
        volume_capacity_m3: 50.0,
        cost_per_kg: Decimal::from(10),
    }
}

fn cargo(id: &str, from: &str, to: &str, weight: f64, revenue: i64, priority: Priority) -> Cargo {
    Cargo {
        cargo_id: id.into(),
        origin: from.into(),
        destination: to.into(),
        weight_kg: weight,
        volume_m3: weight / 250.0,
        revenue: Decimal::from(revenue),
        priority,
        perishable: false,
        max_transit_hours: 24.0,
        ready_time: ts(1, 0, 0),
        due_by: ts(1, 23, 0),
        handling_cost_per_kg: Decimal::ZERO,
        sla_penalty_per_hour: Decimal::from(1000),
    }
}

fn quick_config() -> PlannerConfig {
    PlannerConfig {
        population_size: 16,
        generations: 25,
        ..PlannerConfig::default()
    }
}

#[test]
fn under_capacity_baseline() {
    let planner = Planner::new(
        vec![flight("F1", "DEL", "BOM", (8, 0), (10, 0), 10_000.0)],
        vec![cargo("C1", "DEL", "BOM", 2000.0, 100_000, Priority::Low)],
        vec![],
        quick_config(),
    );
    let outcome = planner.plan(&CancelFlag::new());

    let assignment = &outcome.assignments["C1"];
    assert_eq!(assignment.status, CargoStatus::Delivered);
    assert!(assignment.margin > Decimal::ZERO);
    // revenue 100000 - operating 2000kg * 10/kg, no handling, on time.
    assert_eq!(assignment.margin, Decimal::from(80_000));
    assert_eq!(outcome.summary.delivered, 1);
}

#[test]
fn oversubscription_honors_priority_guarantee() {
    let planner = Planner::new(
        vec![flight("F1", "DEL", "BOM", (8, 0), (10, 0), 1000.0)],
        vec![
            cargo("CH", "DEL", "BOM", 600.0, 60_000, Priority::High),
            cargo("CL", "DEL", "BOM", 600.0, 40_000, Priority::Low),
            cargo("CM", "DEL", "BOM", 600.0, 50_000, Priority::Medium),
        ],
        vec![],
        quick_config(),
    );
    let outcome = planner.plan(&CancelFlag::new());

    assert_eq!(outcome.assignments["CH"].status, CargoStatus::Delivered);
    assert_eq!(outcome.assignments["CM"].status, CargoStatus::Delivered);
    let rolled = &outcome.assignments["CL"];
    assert_eq!(rolled.status, CargoStatus::Rolled);
    assert!(rolled.reason.as_deref().unwrap().contains("F1"));

    assert!(outcome
        .alerts
        .iter()
        .any(|a| a.kind == AlertKind::CapacityBreach
            && a.severity == Severity::Critical
            && a.flight_id.as_deref() == Some("F1")));
}

#[test]
fn two_leg_itinerary_with_connection_rule() {
    let planner = Planner::new(
        vec![
            flight("AB", "AAA", "BBB", (8, 0), (10, 0), 10_000.0),
            flight("BC", "BBB", "CCC", (11, 30), (14, 0), 10_000.0),
        ],
        vec![{
            let mut c = cargo("C1", "AAA", "CCC", 1000.0, 90_000, Priority::Medium);
            c.due_by = ts(1, 15, 0);
            c
        }],
        vec![ConnectionRule {
            origin: "AAA".into(),
            destination: "CCC".into(),
            connection_airport: Some("BBB".into()),
            min_connection_minutes: 60,
            max_connection_minutes: 180,
            handling_fee: Decimal::from(500),
        }],
        quick_config(),
    );
    let outcome = planner.plan(&CancelFlag::new());

    let assignment = &outcome.assignments["C1"];
    assert_eq!(assignment.status, CargoStatus::Delivered);
    let legs: Vec<&str> = assignment.legs.iter().map(|l| l.flight_id.as_str()).collect();
    assert_eq!(legs, vec!["AB", "BC"]);
    assert_eq!(assignment.legs[1].dwell_minutes, 90);
    assert_eq!(assignment.sla_penalty, Decimal::ZERO);
}

#[test]
fn cancelled_leg_denies_cargo_with_alerts() {
    let planner = Planner::new(
        vec![
            flight("AB", "AAA", "BBB", (8, 0), (10, 0), 10_000.0),
            flight("BC", "BBB", "CCC", (11, 30), (14, 0), 10_000.0),
        ],
        vec![{
            let mut c = cargo("C1", "AAA", "CCC", 1000.0, 90_000, Priority::Low);
            c.due_by = ts(1, 15, 0);
            c
        }],
        vec![ConnectionRule {
            origin: "AAA".into(),
            destination: "CCC".into(),
            connection_airport: Some("BBB".into()),
            min_connection_minutes: 60,
            max_connection_minutes: 180,
            handling_fee: Decimal::ZERO,
        }],
        quick_config(),
    );
    let baseline = planner.plan(&CancelFlag::new());
    assert_eq!(baseline.assignments["C1"].status, CargoStatus::Delivered);

    let events = vec![aircargo_planner::domain::DisruptionEvent::Cancel {
        flight_id: "BC".into(),
    }];
    let result = disruption::run(&planner, &baseline, &events);

    assert_eq!(result.plan.assignments["C1"].status, CargoStatus::Denied);
    assert!(result
        .disruption_alerts
        .iter()
        .any(|a| a.kind == AlertKind::StatusChange && a.severity == Severity::Critical));
    assert!(result
        .disruption_alerts
        .iter()
        .any(|a| a.kind == AlertKind::DisruptionApplied && a.severity == Severity::Info));
}

#[test]
fn delay_cascade_misses_connection() {
    let planner = Planner::new(
        vec![
            flight("AB", "AAA", "BBB", (8, 0), (10, 0), 10_000.0),
            flight("BC", "BBB", "CCC", (11, 30), (14, 0), 10_000.0),
        ],
        vec![{
            let mut c = cargo("C1", "AAA", "CCC", 1000.0, 90_000, Priority::Low);
            c.due_by = ts(1, 15, 0);
            c
        }],
        vec![ConnectionRule {
            origin: "AAA".into(),
            destination: "CCC".into(),
            connection_airport: Some("BBB".into()),
            min_connection_minutes: 60,
            max_connection_minutes: 180,
            handling_fee: Decimal::ZERO,
        }],
        quick_config(),
    );
    let baseline = planner.plan(&CancelFlag::new());
    assert_eq!(baseline.assignments["C1"].status, CargoStatus::Delivered);

    // +120 min puts arrival at BBB after the only onward departure.
    let events = vec![aircargo_planner::domain::DisruptionEvent::Delay {
        flight_id: "AB".into(),
        delay_minutes: 120,
    }];
    let result = disruption::run(&planner, &baseline, &events);

    assert_eq!(result.plan.assignments["C1"].status, CargoStatus::Denied);
    assert!(result
        .disruption_alerts
        .iter()
        .any(|a| a.kind == AlertKind::StatusChange && a.severity == Severity::Critical));
    assert!(!result
        .disruption_alerts
        .iter()
        .any(|a| a.kind == AlertKind::Reroute));
}

#[test]
fn low_priority_knapsack_picks_best_subset() {
    let mut items = vec![
        cargo("A", "DEL", "BOM", 600.0, 150_000, Priority::Low),
        cargo("B", "DEL", "BOM", 250.0, 30_000, Priority::Low),
        cargo("C", "DEL", "BOM", 350.0, 38_500, Priority::Low),
        cargo("D", "DEL", "BOM", 400.0, 34_000, Priority::Low),
        cargo("E", "DEL", "BOM", 450.0, 31_500, Priority::Low),
    ];
    for item in &mut items {
        item.volume_m3 = 2.0;
    }
    items[0].volume_m3 = 3.0;

    let mut f = flight("F1", "DEL", "BOM", (8, 0), (10, 0), 1000.0);
    f.volume_capacity_m3 = 10.0;
    let planner = Planner::new(vec![f], items, vec![], quick_config());
    let outcome = planner.plan(&CancelFlag::new());

    let delivered: Vec<&str> = outcome
        .assignments
        .values()
        .filter(|a| a.status == CargoStatus::Delivered)
        .map(|a| a.cargo_id.as_str())
        .collect();
    assert_eq!(delivered, vec!["A", "B"]);

    let load = &outcome.flight_loads["F1"];
    let weight_frac = load.weight_used / 1000.0;
    assert!((0.6..=0.9).contains(&weight_frac));
    assert!(load.weight_used <= 1000.0);
}
