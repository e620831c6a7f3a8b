use percentile_harness::{
    aggregate, build_distribution, extract_anchors, resolve_domain, validate, AggregationError,
    AttemptError, AttemptStatus, DenseDistribution, EngineConfig, ForecastEngine, GridPoint,
    Interpolation, PercentileAnchor, QuestionBounds, QuestionError, ValidationStatus,
};

fn anchors(pairs: &[(f64, f64)]) -> Vec<PercentileAnchor> {
    pairs
        .iter()
        .map(|&(p, v)| PercentileAnchor::new(p, v))
        .collect()
}

#[test]
fn five_point_grid_over_closed_domain_validates_cleanly() {
    let domain = resolve_domain(&QuestionBounds::closed(0.0, 100.0)).unwrap();
    let cfg = EngineConfig::default().with_grid_points(5);

    let dist = build_distribution(
        &anchors(&[(10.0, 5.0), (50.0, 20.0), (90.0, 80.0)]),
        &domain,
        &cfg,
    )
    .unwrap();

    assert_eq!(dist.xs(), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    let cdf = dist.cdf_values();
    assert_eq!(cdf[0], 0.0);
    assert_eq!(cdf[4], 1.0);
    assert!(cdf.windows(2).all(|w| w[0] < w[1]), "{cdf:?}");

    let validated = validate(dist, &domain, &cfg);
    assert_eq!(validated.verdict.status(), ValidationStatus::Accepted);
    assert!(validated.verdict.violations.is_empty());
}

#[test]
fn decreasing_anchor_is_reported_before_interpolation() {
    let text = "Percentile 10: 50\nPercentile 50: 20\nPercentile 90: 80\n";
    match extract_anchors(text).unwrap_err() {
        AttemptError::Monotonicity(e) => {
            assert_eq!((e.lower_percentile, e.lower_value), (10.0, 50.0));
            assert_eq!((e.higher_percentile, e.higher_value), (50.0, 20.0));
        }
        other => panic!("expected monotonicity error, got {other:?}"),
    }
}

#[test]
fn aggregating_nothing_produces_no_output() {
    let domain = resolve_domain(&QuestionBounds::closed(0.0, 1.0)).unwrap();
    let err = aggregate(&[], &domain, &EngineConfig::default()).unwrap_err();
    assert_eq!(err, AggregationError::NoSurvivingAttempts);
}

#[test]
fn log_domain_grid_is_geometric() {
    let domain = resolve_domain(&QuestionBounds::closed(1.0, 1000.0).log_scaled(0.0)).unwrap();
    let xs = domain.grid(4);
    let expected = [1.0, 10.0, 100.0, 1000.0];
    for (x, e) in xs.iter().zip(expected) {
        assert!((x - e).abs() / e < 1e-9, "{xs:?}");
    }
    // Geometric, so differences grow.
    assert!(xs[2] - xs[1] > xs[1] - xs[0]);
}

#[test]
fn open_lower_bound_keeps_mass_below_the_grid() {
    let engine = ForecastEngine::default();
    let bounds = QuestionBounds::closed(0.0, 100.0).open(true, false);
    let forecast = engine
        .forecast_question(
            &bounds,
            &["Percentile 5: 10\nPercentile 50: 40\nPercentile 95: 90"],
        )
        .unwrap();
    let cdf = forecast.distribution.cdf_values();
    assert!(cdf[0] > 0.0);
    assert_eq!(*cdf.last().unwrap(), 1.0);
}

#[test]
fn anchors_on_grid_positions_are_reproduced() {
    let domain = resolve_domain(&QuestionBounds::closed(0.0, 10.0)).unwrap();
    let cfg = EngineConfig::default().with_grid_points(11);
    let pairs: Vec<(f64, f64)> = (1..10).map(|i| (i as f64 * 10.0, i as f64)).collect();

    for scheme in [Interpolation::Linear, Interpolation::MonotoneCubic] {
        let cfg = cfg.clone().with_interpolation(scheme);
        let dist = build_distribution(&anchors(&pairs), &domain, &cfg).unwrap();
        for (i, point) in dist.points().iter().enumerate().take(10).skip(1) {
            assert!(
                (point.cdf - i as f64 / 10.0).abs() < 1e-12,
                "{scheme:?} at {i}: {}",
                point.cdf
            );
        }
    }
}

#[test]
fn single_dip_is_repaired_not_rejected() {
    let domain = resolve_domain(&QuestionBounds::closed(0.0, 100.0)).unwrap();
    let cfg = EngineConfig::default().with_grid_points(6);
    let points = domain
        .grid(6)
        .into_iter()
        .zip([0.0, 0.2, 0.4, 0.35, 0.7, 1.0])
        .map(|(x, cdf)| GridPoint { x, cdf })
        .collect();

    let validated = validate(DenseDistribution::from_points(points), &domain, &cfg);
    assert_eq!(validated.verdict.status(), ValidationStatus::Repaired);
    let cdf = validated.distribution.cdf_values();
    assert!(cdf.windows(2).all(|w| w[0] <= w[1]), "{cdf:?}");

    let again = validate(validated.distribution, &domain, &cfg);
    assert_eq!(again.verdict.status(), ValidationStatus::Accepted);
}

#[test]
fn question_survives_mixed_attempt_quality() {
    let engine = ForecastEngine::default();
    let bounds = QuestionBounds::closed(0.0, 100.0);
    let good = "Percentile 10: 20\nPercentile 50: 45\nPercentile 90: 80";
    let attempts = [
        good,
        "Percentile 10: 60\nPercentile 50: 30\nPercentile 90: 80",
        "I have no idea.",
        "Percentile 10: 50\nPercentile 50: 50.0001\nPercentile 90: 50.0002",
        good,
    ];

    let forecast = engine.forecast_question(&bounds, &attempts).unwrap();
    let statuses: Vec<_> = forecast.attempts.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![
            AttemptStatus::Accepted,
            AttemptStatus::Failed,
            AttemptStatus::Failed,
            AttemptStatus::Rejected,
            AttemptStatus::Accepted,
        ]
    );
    assert_eq!(forecast.distribution.source_count, 2);
    assert_eq!(forecast.attempts[1].error_code.as_deref(), Some("non_monotonic_anchors"));
    assert!(!forecast.attempts[3].violations.is_empty());
}

#[test]
fn bad_bounds_abort_before_any_attempt() {
    let engine = ForecastEngine::default();
    let bounds = QuestionBounds::closed(-5.0, 100.0).log_scaled(0.0);
    let err = engine
        .forecast_question(&bounds, &["Percentile 10: 1\nPercentile 90: 2"])
        .unwrap_err();
    assert!(matches!(err, QuestionError::Domain(_)));
}

#[test]
fn date_question_round_trips_through_the_engine() {
    let engine = ForecastEngine::default();
    // 2030-01-01 .. 2035-01-01 as Unix seconds.
    let bounds = QuestionBounds::closed(1_893_456_000.0, 2_051_222_400.0);
    let text = "\
Percentile 10: 2030-06-01
Percentile 50: 2032-01-01
Percentile 90: 2034-06-01
";
    let forecast = engine.forecast_question(&bounds, &[text]).unwrap();
    let median = forecast.distribution.quantile(0.5).unwrap();
    let expected = 1_956_528_000.0; // 2032-01-01
    assert!((median - expected).abs() < 86_400.0 * 15.0);
}
