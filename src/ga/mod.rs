//! Genetic route-choice optimization.
//!
//! An individual is one route index per cargo, in catalog order. Fitness is
//! the total margin of the simulated plan minus a small per-leg penalty that
//! steers ties toward simpler plans. Fitness evaluation fans out over a
//! rayon pool at each generation barrier; the genetic operators run
//! sequentially in the orchestrator afterwards, driven by a single seeded
//! RNG, so a run is a pure function of its inputs and seed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::pipeline::PlanContext;
use crate::sim;

const TOURNAMENT_SIZE: usize = 3;
const STALE_GENERATION_LIMIT: usize = 20;
const ON_TIME_INIT_BIAS: f64 = 0.7;

/// Cooperative cancellation, honored at each generation barrier.
/// Mid-evaluation individuals always run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct GaOutcome {
    pub best_genes: Vec<usize>,
    pub best_fitness: Decimal,
    pub generations_run: usize,
    pub stopped_early: bool,
    pub budget_exhausted: bool,
    pub cancelled: bool,
}

/// Fitness of one individual: simulated total margin minus the complexity
/// penalty (0.01 per leg).
pub fn fitness_of(ctx: &PlanContext<'_>, genes: &[usize]) -> Decimal {
    let simulation = sim::simulate(ctx, genes);
    simulation.total_margin - Decimal::new(simulation.total_legs as i64, 2)
}

/// Run the GA and return the best individual found.
pub fn optimize(ctx: &PlanContext<'_>, seed: u64, cancel: &CancelFlag) -> GaOutcome {
    let start = Instant::now();
    let budget = ctx.config.optimization_budget_ms.map(Duration::from_millis);
    let mut rng = StdRng::seed_from_u64(seed);

    let gene_count = ctx.catalog.len();
    let population_size = ctx.config.population_size.max(1);
    let crossover_rate = ctx.config.crossover_rate.clamp(0.0, 1.0);
    let mutation_rate = ctx.config.mutation_rate.clamp(0.0, 1.0);

    let mut population: Vec<Vec<usize>> = (0..population_size)
        .map(|_| random_individual(ctx, &mut rng))
        .collect();
    let mut fitness = evaluate(ctx, &population);

    let mut best_index = argmax(&fitness);
    let mut best_genes = population[best_index].clone();
    let mut best_fitness = fitness[best_index];

    let mut generations_run = 0;
    let mut stale = 0;
    let mut stopped_early = false;
    let mut budget_exhausted = false;
    let mut cancelled = false;

    for _ in 0..ctx.config.generations {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        if budget.is_some_and(|b| start.elapsed() >= b) {
            budget_exhausted = true;
            break;
        }

        let mut next = Vec::with_capacity(population_size);
        // Elitism: the best individual survives unchanged.
        next.push(best_genes.clone());
        while next.len() < population_size {
            let first = tournament(&fitness, &mut rng);
            let second = tournament(&fitness, &mut rng);
            let mut child_a = population[first].clone();
            let mut child_b = population[second].clone();
            if gene_count > 1 && rng.gen_bool(crossover_rate) {
                let locus = rng.gen_range(1..gene_count);
                for i in locus..gene_count {
                    std::mem::swap(&mut child_a[i], &mut child_b[i]);
                }
            }
            mutate(ctx, &mut child_a, mutation_rate, &mut rng);
            mutate(ctx, &mut child_b, mutation_rate, &mut rng);
            next.push(child_a);
            if next.len() < population_size {
                next.push(child_b);
            }
        }

        population = next;
        fitness = evaluate(ctx, &population);
        generations_run += 1;

        best_index = argmax(&fitness);
        if fitness[best_index] > best_fitness {
            best_fitness = fitness[best_index];
            best_genes = population[best_index].clone();
            stale = 0;
            debug!(
                generation = generations_run,
                fitness = %best_fitness,
                "new best individual"
            );
        } else {
            stale += 1;
            if stale >= STALE_GENERATION_LIMIT {
                stopped_early = true;
                break;
            }
        }
    }

    info!(
        generations_run,
        fitness = %best_fitness,
        stopped_early,
        budget_exhausted,
        cancelled,
        "optimization finished"
    );

    GaOutcome {
        best_genes,
        best_fitness,
        generations_run,
        stopped_early,
        budget_exhausted,
        cancelled,
    }
}

fn evaluate(ctx: &PlanContext<'_>, population: &[Vec<usize>]) -> Vec<Decimal> {
    population
        .par_iter()
        .map(|genes| fitness_of(ctx, genes))
        .collect()
}

fn random_individual(ctx: &PlanContext<'_>, rng: &mut StdRng) -> Vec<usize> {
    (0..ctx.catalog.len())
        .map(|gene| {
            let options = ctx.catalog.options_for(gene);
            let on_time: Vec<usize> = options
                .iter()
                .enumerate()
                .filter(|(_, o)| o.on_time && !o.is_denied())
                .map(|(i, _)| i)
                .collect();
            if !on_time.is_empty() && rng.gen_bool(ON_TIME_INIT_BIAS) {
                on_time[rng.gen_range(0..on_time.len())]
            } else {
                rng.gen_range(0..options.len())
            }
        })
        .collect()
}

fn mutate(ctx: &PlanContext<'_>, genes: &mut [usize], rate: f64, rng: &mut StdRng) {
    for (gene, value) in genes.iter_mut().enumerate() {
        if rng.gen_bool(rate) {
            *value = rng.gen_range(0..ctx.catalog.options_for(gene).len());
        }
    }
}

fn tournament(fitness: &[Decimal], rng: &mut StdRng) -> usize {
    let mut best = rng.gen_range(0..fitness.len());
    for _ in 1..TOURNAMENT_SIZE {
        let challenger = rng.gen_range(0..fitness.len());
        if fitness[challenger] > fitness[best] {
            best = challenger;
        }
    }
    best
}

fn argmax(fitness: &[Decimal]) -> usize {
    let mut best = 0;
    for i in 1..fitness.len() {
        if fitness[i] > fitness[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::domain::{Cargo, CargoId, Flight, Priority, RuleIndex};
    use crate::graph::FlightGraph;
    use crate::routes::RouteCatalog;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn flight(id: &str, from: &str, to: &str, dep_h: u32, arr_h: u32) -> Flight {
        Flight {
            flight_id: id.into(),
            origin: from.into(),
            destination: to.into(),
            departure: Utc.with_ymd_and_hms(2026, 3, 1, dep_h, 0, 0).unwrap(),
            arrival: Utc.with_ymd_and_hms(2026, 3, 1, arr_h, 0, 0).unwrap(),
            weight_capacity_kg: 5000.0,
            volume_capacity_m3: 50.0,
            cost_per_kg: Decimal::from(10),
        }
    }

    fn cargo(id: &str, revenue: i64) -> Cargo {
        Cargo {
            cargo_id: id.into(),
            origin: "DEL".into(),
            destination: "BOM".into(),
            weight_kg: 1000.0,
            volume_m3: 4.0,
            revenue: Decimal::from(revenue),
            priority: Priority::Low,
            perishable: false,
            max_transit_hours: 24.0,
            ready_time: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            due_by: Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap(),
            handling_cost_per_kg: Decimal::ZERO,
            sla_penalty_per_hour: Decimal::from(100),
        }
    }

    struct Fixture {
        graph: FlightGraph,
        cargo: BTreeMap<CargoId, Cargo>,
        catalog: RouteCatalog,
        config: PlannerConfig,
    }

    impl Fixture {
        fn new(flights: Vec<Flight>, cargo_items: Vec<Cargo>, config: PlannerConfig) -> Self {
            let graph = FlightGraph::from_flights(
                flights
                    .into_iter()
                    .map(|f| (f.flight_id.clone(), f))
                    .collect(),
            );
            let cargo: BTreeMap<CargoId, Cargo> = cargo_items
                .into_iter()
                .map(|c| (c.cargo_id.clone(), c))
                .collect();
            let rules = RuleIndex::default();
            let catalog = RouteCatalog::build(&cargo, &graph, &rules, &config);
            Fixture {
                graph,
                cargo,
                catalog,
                config,
            }
        }

        fn ctx(&self) -> PlanContext<'_> {
            PlanContext {
                graph: &self.graph,
                cargo: &self.cargo,
                catalog: &self.catalog,
                config: &self.config,
            }
        }
    }

    fn small_config() -> PlannerConfig {
        PlannerConfig {
            population_size: 12,
            generations: 30,
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn same_seed_produces_identical_outcome() {
        let fixture = Fixture::new(
            vec![
                flight("F1", "DEL", "BOM", 8, 10),
                flight("F2", "DEL", "BOM", 12, 14),
            ],
            vec![cargo("C1", 100_000), cargo("C2", 50_000)],
            small_config(),
        );
        let ctx = fixture.ctx();
        let first = optimize(&ctx, 7, &CancelFlag::new());
        let second = optimize(&ctx, 7, &CancelFlag::new());
        assert_eq!(first.best_genes, second.best_genes);
        assert_eq!(first.best_fitness, second.best_fitness);
        assert_eq!(first.generations_run, second.generations_run);
    }

    #[test]
    fn early_stop_after_stale_generations() {
        // One cargo, one route: fitness can never improve.
        let fixture = Fixture::new(
            vec![flight("F1", "DEL", "BOM", 8, 10)],
            vec![cargo("C1", 100_000)],
            small_config(),
        );
        let outcome = optimize(&fixture.ctx(), 3, &CancelFlag::new());
        assert!(outcome.stopped_early);
        assert_eq!(outcome.generations_run, STALE_GENERATION_LIMIT);
    }

    #[test]
    fn zero_budget_returns_best_so_far() {
        let fixture = Fixture::new(
            vec![flight("F1", "DEL", "BOM", 8, 10)],
            vec![cargo("C1", 100_000)],
            PlannerConfig {
                optimization_budget_ms: Some(0),
                ..small_config()
            },
        );
        let outcome = optimize(&fixture.ctx(), 3, &CancelFlag::new());
        assert!(outcome.budget_exhausted);
        assert_eq!(outcome.generations_run, 0);
        assert_eq!(outcome.best_genes, vec![0]);
    }

    #[test]
    fn cancelled_run_stops_at_first_barrier() {
        let fixture = Fixture::new(
            vec![flight("F1", "DEL", "BOM", 8, 10)],
            vec![cargo("C1", 100_000)],
            small_config(),
        );
        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcome = optimize(&fixture.ctx(), 3, &cancel);
        assert!(outcome.cancelled);
        assert_eq!(outcome.generations_run, 0);
    }
}
