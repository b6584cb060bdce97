use chrono::NaiveDateTime;
use seller_impact_core::{
    config::{ImpactConfig, InfraCostModel, SearchConfig},
    pipeline::SellerKpis,
    profitability::SellerMetrics,
    scenario::ScenarioEngine,
    synthetic::{DatasetShape, SyntheticSource},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const FREE_INFRA: InfraCostModel = InfraCostModel::SquareRoot {
    alpha: 0.0,
    beta: 0.0,
};

/// A seller with 300 of revenue and enough review cost to land on
/// `gross_profit`. Revenue splits 200 commission / 100 subscription.
fn seller(id: &str, gross_profit: f64, quantity: u64) -> SellerMetrics {
    let revenues = 300.0;
    SellerMetrics {
        kpis: SellerKpis {
            seller_id: id.into(),
            seller_city: "curitiba".into(),
            seller_state: "PR".into(),
            delay_to_carrier: Some(0.0),
            wait_time: Some(7.0),
            date_first_sale: NaiveDateTime::default(),
            date_last_sale: NaiveDateTime::default(),
            months_on_olist: 1,
            n_orders: quantity,
            quantity,
            quantity_per_order: 1.0,
            sales: 2000.0,
            share_of_one_stars: 0.0,
            share_of_five_stars: 1.0,
            review_score: 5.0,
            cost_of_reviews: revenues - gross_profit,
        },
        commission_revenue: 200.0,
        subscription_revenue: 100.0,
        revenues,
        gross_profit,
    }
}

fn spread(profits: &[f64]) -> Vec<SellerMetrics> {
    profits
        .iter()
        .enumerate()
        .map(|(i, &p)| seller(&format!("s{i:03}"), p, 1 + i as u64 % 4))
        .collect()
}

fn synthetic_engine(seed: u64) -> ScenarioEngine {
    let shape = DatasetShape {
        sellers: 120,
        orders: 3_000,
        ..DatasetShape::default()
    };
    let raw = SyntheticSource::new(seed, shape).generate();
    let config = ImpactConfig::default();
    let table =
        seller_impact_core::pipeline::aggregate(&raw, &config.profitability).expect("aggregate");
    ScenarioEngine::new(&table.sellers, config.infrastructure)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Three sellers [-100, 50, 200], one item each, free infrastructure.
#[test]
fn removing_the_loss_maker_is_optimal() {
    let sellers = vec![
        seller("a", -100.0, 1),
        seller("b", 50.0, 1),
        seller("c", 200.0, 1),
    ];
    let engine = ScenarioEngine::new(&sellers, FREE_INFRA);

    assert!(approx(engine.evaluate(0).net_profit, 150.0));
    assert!(approx(engine.evaluate(1).net_profit, 250.0));
    assert!(approx(engine.evaluate(2).net_profit, 200.0));
    assert!(approx(engine.evaluate(3).net_profit, 0.0));

    let best = engine.optimal(&SearchConfig::default());
    assert_eq!(best.k, 1);
    assert!(approx(best.net_profit, 250.0));
    assert!(best.exhaustive);
    assert_eq!(best.candidates_evaluated, 4);
}

/// k = 0 reproduces the totals of the unfiltered table.
#[test]
fn baseline_matches_table_totals() {
    let sellers = spread(&[-40.0, 10.0, 75.0, -5.0, 120.0]);
    let infra = InfraCostModel::olist_sqrt();
    let engine = ScenarioEngine::new(&sellers, infra.clone());
    let r = engine.evaluate(0);

    let items: u64 = sellers.iter().map(|s| s.kpis.quantity).sum();
    let revenue: f64 = sellers.iter().map(|s| s.revenues).sum();
    let review_cost: f64 = sellers.iter().map(|s| s.kpis.cost_of_reviews).sum();

    assert_eq!(r.n_sellers, 5);
    assert_eq!(r.n_items, items);
    assert!(approx(r.revenue, revenue));
    assert!(approx(r.review_cost, review_cost));
    assert!(approx(r.gross_profit_total, revenue - review_cost));
    assert!(approx(r.it_cost, infra.cost(5, items)));
    assert!(approx(r.net_profit, r.gross_profit_total - r.it_cost));
    assert_eq!(engine.baseline(), r);
}

/// Removing everyone zeroes every total, including the sqrt IT cost.
#[test]
fn removing_everyone_zeroes_all_totals() {
    let sellers = spread(&[5.0, -3.0, 8.0]);
    let engine = ScenarioEngine::new(&sellers, InfraCostModel::olist_sqrt());
    let r = engine.evaluate(3);

    assert_eq!(r.k, 3);
    assert_eq!(r.n_sellers, 0);
    assert_eq!(r.n_items, 0);
    assert_eq!(r.revenue, 0.0);
    assert_eq!(r.review_cost, 0.0);
    assert_eq!(r.it_cost, 0.0);
    assert_eq!(r.net_profit, 0.0);
}

#[test]
fn cutoff_is_clamped_to_population() {
    let sellers = spread(&[5.0, -3.0, 8.0]);
    let engine = ScenarioEngine::new(&sellers, InfraCostModel::olist_sqrt());
    assert_eq!(engine.evaluate(99), engine.evaluate(3));
    assert_eq!(engine.evaluate(99).k, 3);
    assert_eq!(engine.compare(99).removed, 3);
}

#[test]
fn empty_table_evaluates_to_zero() {
    let engine = ScenarioEngine::new(&[], InfraCostModel::olist_sqrt());
    assert!(engine.is_empty());
    assert_eq!(engine.evaluate(0).net_profit, 0.0);
    assert!(engine.curve().is_empty());
    assert_eq!(engine.optimal(&SearchConfig::default()).k, 0);
}

/// Equal gross profits are ranked by seller_id.
#[test]
fn ties_rank_by_seller_id() {
    let sellers = vec![seller("b", 10.0, 1), seller("a", 10.0, 1), seller("c", -5.0, 1)];
    let engine = ScenarioEngine::new(&sellers, FREE_INFRA);
    let order: Vec<&str> = engine.removal_order().map(|(id, _)| id).collect();
    assert_eq!(order, vec!["c", "a", "b"]);
}

/// The curve keeping `j` sellers is the scenario removing `N - j`.
#[test]
fn curve_mirrors_evaluate() {
    let engine = synthetic_engine(11);
    let n = engine.len();
    let curve = engine.curve();
    assert_eq!(curve.len(), n);

    for point in &curve {
        let r = engine.evaluate(n - point.kept);
        assert_eq!(point.cum_items, r.n_items);
        assert!(approx(point.cum_revenue, r.revenue));
        assert!(approx(point.cum_gross_profit, r.gross_profit_total));
        assert!(approx(point.cum_it_cost, r.it_cost));
        assert!(approx(point.cum_net_profit, r.net_profit));
    }
    assert_eq!(curve.first().map(|p| p.kept), Some(1));
    assert_eq!(curve.last().map(|p| p.kept), Some(n));
}

/// Gross profit rises while loss makers are removed, then falls.
#[test]
fn gross_profit_is_unimodal_in_k() {
    let profits = [20.0, -30.0, 5.0, 40.0, -10.0, 0.0, 12.5, -0.5];
    let sellers = spread(&profits);
    let engine = ScenarioEngine::new(&sellers, InfraCostModel::olist_sqrt());
    let losers = profits.iter().filter(|p| **p < 0.0).count();

    for k in 0..sellers.len() {
        let here = engine.evaluate(k).gross_profit_total;
        let next = engine.evaluate(k + 1).gross_profit_total;
        if k < losers {
            assert!(next >= here - 1e-9, "k={k}: {next} < {here}");
        } else {
            assert!(next <= here + 1e-9, "k={k}: {next} > {here}");
        }
    }
}

/// The optimum beats every cutoff that was evaluated.
#[test]
fn optimal_dominates_every_candidate() {
    let engine = synthetic_engine(3);
    let search = SearchConfig::default();
    let best = engine.optimal(&search);

    assert!(best.exhaustive);
    for k in engine.candidates(&search) {
        assert!(
            best.net_profit >= engine.evaluate(k).net_profit,
            "cutoff {k} beats the reported optimum {}",
            best.k
        );
    }
    assert_eq!(engine.evaluate(best.k), best.scenario);
}

/// Above the exhaustive limit only every step-th cutoff (plus N) is tried.
#[test]
fn large_tables_fall_back_to_sampling() {
    let profits: Vec<f64> = (0..25).map(|i| f64::from(i) * 3.0 - 20.0).collect();
    let engine = ScenarioEngine::new(&spread(&profits), InfraCostModel::olist_sqrt());
    let search = SearchConfig {
        exhaustive_limit: 10,
        sample_step: 10,
    };

    assert_eq!(engine.candidates(&search), vec![0, 10, 20, 25]);
    let best = engine.optimal(&search);
    assert!(!best.exhaustive);
    assert_eq!(best.candidates_evaluated, 4);
    assert!([0, 10, 20, 25].contains(&best.k));
}

#[test]
fn equal_outcomes_prefer_fewest_removals() {
    let engine = ScenarioEngine::new(&spread(&[0.0, 0.0, 0.0]), FREE_INFRA);
    assert_eq!(engine.optimal(&SearchConfig::default()).k, 0);
}

#[test]
fn linear_infrastructure_cost() {
    let infra = InfraCostModel::Linear {
        base: 1000.0,
        per_seller: 10.0,
        per_item: 1.0,
    };
    let sellers = vec![seller("a", 100.0, 1), seller("b", 100.0, 1), seller("c", 100.0, 1)];
    let engine = ScenarioEngine::new(&sellers, infra);

    assert!(approx(engine.evaluate(0).it_cost, 1000.0 + 30.0 + 3.0));
    assert!(approx(engine.evaluate(0).net_profit, 300.0 - 1033.0));
    // The fixed charge remains with nobody left.
    assert!(approx(engine.evaluate(3).it_cost, 1000.0));
    assert!(approx(engine.evaluate(3).net_profit, -1000.0));
}

#[test]
fn breakdown_adds_up() {
    let engine = synthetic_engine(5);
    for k in [0, 1, engine.len() / 2, engine.len()] {
        let b = engine.breakdown(k);
        assert!(approx(b.subscription_revenue + b.commission_revenue, b.revenue));
        assert!(approx(b.revenue - b.review_cost, b.gross_profit));
        assert!(approx(b.gross_profit - b.it_cost, b.net_profit));
        assert!(approx(b.net_profit, engine.evaluate(k).net_profit));
    }
}

#[test]
fn comparison_is_relative_to_baseline() {
    let sellers = vec![
        seller("a", -100.0, 1),
        seller("b", 50.0, 1),
        seller("c", 200.0, 1),
    ];
    let engine = ScenarioEngine::new(&sellers, FREE_INFRA);
    let c = engine.compare(1);

    assert_eq!(c.removed, 1);
    assert_eq!(c.kept, 2);
    assert!(approx(c.baseline_net_profit, 150.0));
    assert!(approx(c.net_profit_delta, 100.0));
}
