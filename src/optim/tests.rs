//! Tests for feedback application

use super::*;
use crate::autograd::{backward, Data, Feedback, FeedbackContext, Variable};
use crate::config::EngineConfig;
use crate::error::Error;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records applied feedback and how many applications overlapped
#[derive(Default)]
struct Recorder {
    applied: Mutex<Vec<Feedback>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl Data for Recorder {
    fn datatype(&self) -> &str {
        "Recorder"
    }

    fn json(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    async fn apply_feedback(&self, feedback: &[Feedback]) -> crate::Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::application("recorder", "rejected"));
        }
        self.applied.lock().unwrap().extend_from_slice(feedback);
        Ok(())
    }
}

fn recorder() -> Variable<Recorder> {
    Variable::parameter(Recorder::default())
}

async fn sealed() -> FeedbackContext {
    let root = Variable::constant(Recorder::default());
    backward(&root.erase()).await.unwrap()
}

#[test]
fn test_empty_parameter_set_rejected() {
    let err = FeedbackApplier::new(Vec::new()).unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
}

#[test]
fn test_constant_parameter_rejected() {
    let c = Variable::constant(Recorder::default());
    let err = FeedbackApplier::new([recorder().erase(), c.erase()]).unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
}

#[test]
fn test_duplicates_collapsed() {
    let p = recorder();
    let applier = FeedbackApplier::new([p.erase(), p.erase()]).unwrap();
    assert_eq!(applier.parameters().len(), 1);
}

#[test]
fn test_concurrency_from_config() {
    let config = EngineConfig {
        max_concurrency: 0,
        ..EngineConfig::default()
    };
    let applier = FeedbackApplier::from_config([recorder().erase()], &config).unwrap();
    assert_eq!(applier.max_concurrency(), 1);
}

#[tokio::test]
async fn test_step_requires_sealed_context() {
    let p = recorder();
    p.append_feedback("F");
    let mut applier = FeedbackApplier::new([p.erase()]).unwrap();

    let err = applier.step(&FeedbackContext::new()).await.unwrap_err();

    assert!(matches!(err, Error::Invariant(_)));
    assert_eq!(p.feedback().len(), 1);
}

#[tokio::test]
async fn test_step_applies_and_clears() {
    let a = recorder();
    let b = recorder();
    let idle = recorder();
    let c = &a.erase() + &b.erase();
    c.append_feedback("F");

    let mut applier = FeedbackApplier::new([a.erase(), b.erase(), idle.erase()]).unwrap();
    let ctx = backward(&c.erase()).await.unwrap();
    let applied = applier.step(&ctx).await.unwrap();

    assert_eq!(applied, 2);
    assert_eq!(*a.applied.lock().unwrap(), vec![Feedback::from("F")]);
    assert_eq!(*b.applied.lock().unwrap(), vec![Feedback::from("F")]);
    assert!(a.feedback().is_empty());
    assert!(idle.applied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_applications_bounded_by_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let params: Vec<Variable<Recorder>> = (0..6)
        .map(|_| {
            Variable::parameter(Recorder {
                in_flight: Arc::clone(&in_flight),
                peak: Arc::clone(&peak),
                ..Recorder::default()
            })
        })
        .collect();
    for p in &params {
        p.append_feedback("F");
    }

    let mut applier = FeedbackApplier::new(params.iter().map(|p| p.erase()))
        .unwrap()
        .with_concurrency(2);
    let applied = applier.step(&sealed().await).await.unwrap();

    assert_eq!(applied, 6);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_step_runs_on_spawned_task() {
    let params: Vec<Variable<Recorder>> = (0..4).map(|_| recorder()).collect();
    for p in &params {
        p.append_feedback("F");
    }
    let mut applier = FeedbackApplier::new(params.iter().map(|p| p.erase()))
        .unwrap()
        .with_concurrency(3);
    let ctx = sealed().await;

    let applied = tokio::spawn(async move { applier.step(&ctx).await })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(applied, 4);
    for p in &params {
        assert_eq!(*p.applied.lock().unwrap(), vec![Feedback::from("F")]);
        assert!(p.feedback().is_empty());
    }
}

#[tokio::test]
async fn test_failed_application_surfaces_and_keeps_buffer() {
    let bad = Variable::parameter(Recorder {
        fail: true,
        ..Recorder::default()
    });
    bad.append_feedback("F");
    let mut applier = FeedbackApplier::new([bad.erase()]).unwrap();

    let err = applier.step(&sealed().await).await.unwrap_err();

    assert!(matches!(err, Error::Application { .. }));
    assert_eq!(bad.feedback().len(), 1);
}

#[tokio::test]
async fn test_zero_feedback_clears_all() {
    let a = recorder();
    let b = recorder();
    a.append_feedback("x");
    b.append_feedback("y");
    let applier = FeedbackApplier::new([a.erase(), b.erase()]).unwrap();

    applier.zero_feedback();

    assert!(!a.has_feedback());
    assert!(!b.has_feedback());
}

#[tokio::test]
async fn test_step_helper_runs_pass_and_applies() {
    let a = recorder();
    let loss = crate::autograd::apply_loss(&[a.erase()], "be brief").await.unwrap();

    let applied = step(&loss.erase(), [a.erase()]).await.unwrap();

    assert_eq!(applied, 1);
    assert_eq!(*a.applied.lock().unwrap(), vec![Feedback::from("be brief")]);
}
