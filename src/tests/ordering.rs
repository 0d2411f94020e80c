//! Ordering and serialization guarantees of the drain loop.

use super::*;

/// Calls from a single producer execute in the exact order enqueued.
#[test]
fn fifo_single_producer() {
    let host = ServiceHost::new();
    let (rec, log) = Recorder::new();
    let wrapper = host.create_session(Box::new(rec)).unwrap();
    let proxy = wrapper.proxy();

    let producer = thread::spawn(move || {
        for i in 0..100 {
            proxy.update_selection(selection(i));
        }
    });
    producer.join().unwrap();

    wrapper.progress();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 100);
    for (i, entry) in log.iter().enumerate() {
        assert_eq!(entry, &format!("update_selection:{}", i));
    }
}

/// Two interleaved producers: same-producer order is preserved, every call
/// is delivered exactly once, and the result receiver fires exactly once.
#[test]
fn interleaved_producers() {
    let host = ServiceHost::new();
    let (rec, log) = Recorder::new();
    let wrapper = host.create_session(Box::new(rec)).unwrap();

    let p1 = wrapper.proxy();
    let h1 = thread::spawn(move || {
        p1.start_input(
            EditorInfo {
                input_type: 1,
                initial_sel_start: 0,
                initial_sel_end: 0,
                hint: None,
            },
            false,
        );
        p1.update_selection(selection(3));
    });

    let (result_tx, result_rx) = mpsc::channel();
    let p2 = wrapper.proxy();
    let h2 = thread::spawn(move || {
        let sink = ResultSink::new(move |shown| result_tx.send(shown).unwrap());
        p2.show_soft_input(1, Some(sink));
    });
    h1.join().unwrap();
    h2.join().unwrap();

    wrapper.progress();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 3);
    let start_pos = log.iter().position(|e| e == "start_input:1:false").unwrap();
    let update_pos = log.iter().position(|e| e == "update_selection:3").unwrap();
    assert!(start_pos < update_pos);
    assert_eq!(log.iter().filter(|e| *e == "show_soft_input:1").count(), 1);

    // Exactly one result callback.
    assert_eq!(result_rx.recv().unwrap(), true);
    assert!(result_rx.try_recv().is_err());
}

/// A call submitted on the owner thread itself runs immediately, without an
/// explicit drain.
#[test]
fn run_now_on_owner_thread() {
    let host = ServiceHost::new();
    let (rec, log) = Recorder::new();
    let wrapper = host.create_session(Box::new(rec)).unwrap();
    let proxy = wrapper.proxy();

    // Claim ownership of this thread.
    wrapper.progress();

    proxy.attach_token(7);
    assert_eq!(log.lock().unwrap().as_slice(), ["attach_token:7"]);
}

/// A handler submitting into its own session must not deadlock; the nested
/// call is queued and drained by the same progress iteration.
#[test]
fn reentrant_submission() {
    struct Chainer {
        proxy: Arc<Mutex<Option<SessionProxy>>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl CallTarget for Chainer {
        fn attach_token(&mut self, token: BindToken) {
            self.log.lock().unwrap().push(format!("attach_token:{}", token));
            if let Some(proxy) = self.proxy.lock().unwrap().as_ref() {
                proxy.update_selection(selection(9));
            }
        }

        fn update_selection(&mut self, update: SelectionUpdate) {
            self.log
                .lock()
                .unwrap()
                .push(format!("update_selection:{}", update.sel_start));
        }
    }

    let host = ServiceHost::new();
    let proxy_cell = Arc::new(Mutex::new(None));
    let log = Arc::new(Mutex::new(Vec::new()));
    let wrapper = host
        .create_session(Box::new(Chainer {
            proxy: proxy_cell.clone(),
            log: log.clone(),
        }))
        .unwrap();
    *proxy_cell.lock().unwrap() = Some(wrapper.proxy());

    wrapper.proxy().attach_token(1);
    wrapper.progress();

    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["attach_token:1", "update_selection:9"]
    );
}

/// Under concurrent enqueue from many producers, the target is never entered
/// by more than one thread at a time, and nothing is lost.
#[test]
fn serialized_under_concurrent_producers() {
    const PRODUCERS: usize = 8;
    const CALLS_PER_PRODUCER: usize = 200;

    let host = ServiceHost::new();
    let (rec, log, max_active) = Recorder::with_delay(Duration::from_micros(20));
    let wrapper = host.create_session(Box::new(rec)).unwrap();
    let proxy = wrapper.proxy();

    let dispatch = DispatchLoop::spawn(wrapper);

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let proxy = proxy.clone();
            thread::spawn(move || {
                for i in 0..CALLS_PER_PRODUCER {
                    proxy.update_selection(selection(i as i32));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(wait_until(Duration::from_secs(10), || {
        log.lock().unwrap().len() == PRODUCERS * CALLS_PER_PRODUCER
    }));
    drop(dispatch);

    assert_eq!(max_active.load(Ordering::SeqCst), 1);
}
