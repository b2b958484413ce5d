//! Decoder pool tests: submission, lifecycle, and the one-shot spawn helper.

use koda_core::{
    encode, spawn_decode, DecodeError, DecodeOptions, DecoderPool, EncodeOptions, PoolOptions,
    Value,
};

fn obj(pairs: Vec<(&str, Value)>) -> Value {
    Value::Object(pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
}

fn encoded(value: &Value) -> Vec<u8> {
    encode(value, &EncodeOptions::default()).unwrap()
}

#[test]
fn pool_decodes_submitted_buffers() {
    let pool = DecoderPool::new(&PoolOptions { pool_size: 2 });
    let values: Vec<Value> = (0..8)
        .map(|i| obj(vec![("seq", Value::Int(i))]))
        .collect();

    let jobs: Vec<_> = values
        .iter()
        .map(|v| pool.decode(encoded(v), DecodeOptions::default()).unwrap())
        .collect();

    for (job, expected) in jobs.into_iter().zip(&values) {
        assert_eq!(&job.wait().unwrap(), expected);
    }
}

#[test]
fn handles_can_be_awaited_in_any_order() {
    let pool = DecoderPool::new(&PoolOptions { pool_size: 3 });
    let a = pool
        .decode(encoded(&Value::Int(1)), DecodeOptions::default())
        .unwrap();
    let b = pool
        .decode(encoded(&Value::Int(2)), DecodeOptions::default())
        .unwrap();
    // waiting on the later submission first is fine
    assert_eq!(b.wait().unwrap(), Value::Int(2));
    assert_eq!(a.wait().unwrap(), Value::Int(1));
}

#[test]
fn decode_errors_travel_through_the_pool() {
    let pool = DecoderPool::new(&PoolOptions { pool_size: 1 });
    let job = pool
        .decode(b"not koda".to_vec(), DecodeOptions::default())
        .unwrap();
    assert!(matches!(job.wait(), Err(DecodeError::BadMagic { .. })));
}

#[test]
fn options_ride_along_with_the_job() {
    let deep = Value::Array(vec![Value::Array(vec![Value::Int(1)])]);
    let pool = DecoderPool::new(&PoolOptions { pool_size: 1 });
    let strict = DecodeOptions {
        max_depth: 2,
        ..DecodeOptions::default()
    };
    let job = pool.decode(encoded(&deep), strict).unwrap();
    assert!(matches!(job.wait(), Err(DecodeError::DepthExceeded { .. })));
}

#[test]
fn destroy_drains_then_rejects_new_submissions() {
    let mut pool = DecoderPool::new(&PoolOptions { pool_size: 2 });
    let pending: Vec<_> = (0..4)
        .map(|i| {
            let value = obj(vec![("n", Value::Int(i))]);
            (pool.decode(encoded(&value), DecodeOptions::default()).unwrap(), value)
        })
        .collect();

    pool.destroy();

    // jobs submitted before destroy still complete
    for (job, expected) in pending {
        assert_eq!(job.wait().unwrap(), expected);
    }

    let err = pool
        .decode(encoded(&Value::Null), DecodeOptions::default())
        .unwrap_err();
    assert!(matches!(err, DecodeError::PoolClosed));
}

#[test]
fn destroy_is_idempotent_and_runs_on_drop() {
    let mut pool = DecoderPool::new(&PoolOptions { pool_size: 1 });
    pool.destroy();
    pool.destroy();
    drop(pool);
}

#[test]
fn abandoned_handles_discard_their_results() {
    let pool = DecoderPool::new(&PoolOptions { pool_size: 1 });
    for _ in 0..4 {
        let job = pool
            .decode(encoded(&Value::Bool(true)), DecodeOptions::default())
            .unwrap();
        drop(job);
    }
    // the pool stays usable afterwards
    let job = pool
        .decode(encoded(&Value::Null), DecodeOptions::default())
        .unwrap();
    assert_eq!(job.wait().unwrap(), Value::Null);
}

#[test]
fn try_wait_eventually_sees_the_result() {
    let pool = DecoderPool::new(&PoolOptions { pool_size: 1 });
    let job = pool
        .decode(encoded(&Value::Int(9)), DecodeOptions::default())
        .unwrap();
    let outcome = loop {
        if let Some(outcome) = job.try_wait() {
            break outcome;
        }
        std::thread::yield_now();
    };
    assert_eq!(outcome.unwrap(), Value::Int(9));
}

#[test]
fn spawn_decode_runs_without_a_pool() {
    let value = obj(vec![("answer", Value::Int(42))]);
    let job = spawn_decode(encoded(&value), DecodeOptions::default());
    assert_eq!(job.wait().unwrap(), value);
}
