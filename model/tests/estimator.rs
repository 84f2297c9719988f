use model::{Capability, Estimator, LinearRegression, MeanRegressor, MlErr, Model, NearestCentroid};
use ndarray::array;

#[test]
fn unfitted_snapshot_only_needs_the_kind() {
    let est: Estimator = serde_json::from_str(r#"{"kind":"linear_regression"}"#).unwrap();
    assert_eq!(est, Estimator::LinearRegression(LinearRegression::default()));
    assert_eq!(est.describe(), "LinearRegression(alpha=0, unfitted)");
}

#[test]
fn capability_follows_the_wrapped_model() {
    let cases = [
        (Estimator::from(LinearRegression::default()), Capability::Predictor),
        (Estimator::from(MeanRegressor::default()), Capability::Predictor),
        (Estimator::from(NearestCentroid::new()), Capability::Probabilistic),
    ];

    for (est, expected) in cases {
        assert_eq!(est.capability(), expected, "{}", est.describe());
    }
}

#[test]
fn fitted_estimator_survives_serialization() {
    let mut est = Estimator::from(LinearRegression::new(0.0));
    let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 2.0], [3.0, 1.0]];
    let y = array![1.0, 2.0, 5.0, 4.5];
    est.fit(x.view(), y.view()).unwrap();

    let json = serde_json::to_vec(&est).unwrap();
    let restored: Estimator = serde_json::from_slice(&json).unwrap();

    assert_eq!(restored, est);
    assert_eq!(
        restored.predict(x.view()).unwrap(),
        est.predict(x.view()).unwrap()
    );
}

#[test]
fn mean_regressor_ignores_features() {
    let mut est = Estimator::from(MeanRegressor::default());
    est.fit(array![[1.0], [2.0], [3.0]].view(), array![2.0, 4.0, 6.0].view())
        .unwrap();

    let pred = est.predict(array![[100.0], [-3.0]].view()).unwrap();
    assert_eq!(pred.to_vec(), vec![4.0, 4.0]);
    assert_eq!(est.describe(), "MeanRegressor(mean=4)");
}

#[test]
fn unknown_kind_is_rejected() {
    let res = serde_json::from_str::<Estimator>(r#"{"kind":"random_forest"}"#);
    assert!(res.is_err());
}

#[test]
fn non_finite_training_data_is_rejected() {
    let models = [
        Estimator::from(LinearRegression::new(0.0)),
        Estimator::from(MeanRegressor::default()),
        Estimator::from(NearestCentroid::new()),
    ];
    let cases = [
        (array![[f64::INFINITY], [1.0]], array![1.0, 2.0], "features"),
        (array![[0.0], [1.0]], array![f64::NAN, 2.0], "labels"),
        (array![[0.0], [1.0]], array![1.0, f64::NEG_INFINITY], "labels"),
    ];

    for mut est in models {
        let before = est.clone();
        for (x, y, what) in &cases {
            let res = est.fit(x.view(), y.view());
            assert_eq!(res, Err(MlErr::NonFinite(*what)), "{}", est.describe());
            assert_eq!(est, before);
        }
    }
}

#[test]
fn overflowing_mean_is_rejected() {
    let mut est = Estimator::from(MeanRegressor::default());
    est.fit(array![[0.0]].view(), array![1.0].view()).unwrap();
    let before = est.clone();

    let res = est.fit(array![[0.0], [0.0]].view(), array![f64::MAX, f64::MAX].view());

    assert_eq!(res, Err(MlErr::NonFinite("mean")));
    assert_eq!(est, before);
    assert!(serde_json::to_vec(&est).is_ok());
}
