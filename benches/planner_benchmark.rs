use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

use aircargo_planner::domain::{Cargo, CargoId, Flight, Priority, RuleIndex};
use aircargo_planner::graph::FlightGraph;
use aircargo_planner::routes::RouteCatalog;
use aircargo_planner::{CancelFlag, Planner, PlannerConfig};

const AIRPORTS: &[&str] = &["DEL", "BOM", "BLR", "MAA", "CCU", "HYD"];

fn synthetic_flights() -> Vec<Flight> {
    let mut flights = Vec::new();
    let mut id = 0;
    for (i, from) in AIRPORTS.iter().enumerate() {
        for (j, to) in AIRPORTS.iter().enumerate() {
            if i == j {
                continue;
            }
            for wave in 0..3u32 {
                id += 1;
                let dep = 6 + wave * 5 + (i as u32 % 3);
                flights.push(Flight {
                    flight_id: format!("FL{id:03}"),
                    origin: (*from).into(),
                    destination: (*to).into(),
                    departure: Utc.with_ymd_and_hms(2026, 3, 2, dep, 0, 0).unwrap(),
                    arrival: Utc.with_ymd_and_hms(2026, 3, 2, dep + 2, 15, 0).unwrap(),
                    weight_capacity_kg: 8000.0,
                    volume_capacity_m3: 40.0,
                    cost_per_kg: Decimal::new(95, 1),
                });
            }
        }
    }
    flights
}

fn synthetic_cargo() -> Vec<Cargo> {
    let priorities = [Priority::High, Priority::Medium, Priority::Low];
    (0..18)
        .map(|i| {
            let from = AIRPORTS[i % AIRPORTS.len()];
            let to = AIRPORTS[(i + 2) % AIRPORTS.len()];
            Cargo {
                cargo_id: format!("CG{i:03}"),
                origin: from.into(),
                destination: to.into(),
                weight_kg: 500.0 + (i as f64 % 5.0) * 300.0,
                volume_m3: 2.0 + (i as f64 % 4.0),
                revenue: Decimal::from(60_000 + (i as i64 % 7) * 15_000),
                priority: priorities[i % 3],
                perishable: i % 4 == 0,
                max_transit_hours: 20.0,
                ready_time: Utc.with_ymd_and_hms(2026, 3, 2, 4, 0, 0).unwrap(),
                due_by: Utc.with_ymd_and_hms(2026, 3, 3, 2, 0, 0).unwrap(),
                handling_cost_per_kg: Decimal::ONE,
                sla_penalty_per_hour: Decimal::from(800),
            }
        })
        .collect()
}

fn bench_route_enumeration(c: &mut Criterion) {
    let flight_map: BTreeMap<String, Flight> = synthetic_flights()
        .into_iter()
        .map(|f| (f.flight_id.clone(), f))
        .collect();
    let graph = FlightGraph::from_flights(flight_map);
    let cargo: BTreeMap<CargoId, Cargo> = synthetic_cargo()
        .into_iter()
        .map(|c| (c.cargo_id.clone(), c))
        .collect();
    let rules = RuleIndex::default();
    let config = PlannerConfig::default();

    c.bench_function("route_catalog_build", |b| {
        b.iter(|| RouteCatalog::build(&cargo, &graph, &rules, &config))
    });
}

fn bench_full_plan(c: &mut Criterion) {
    let config = PlannerConfig {
        population_size: 20,
        generations: 10,
        ..PlannerConfig::default()
    };
    let planner = Planner::new(synthetic_flights(), synthetic_cargo(), vec![], config);

    c.bench_function("plan_small_network", |b| {
        b.iter(|| planner.plan_with_seed(7, &CancelFlag::new()))
    });
}

criterion_group!(benches, bench_route_enumeration, bench_full_plan);
criterion_main!(benches);
