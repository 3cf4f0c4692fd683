// POSIX message queue backend. Skips when the host has no mqueue support
// (e.g. /dev/mqueue not mounted in a container).

#[cfg(target_os = "linux")]
mod linux_tests {
    use dmxp_qbench::Bench::{BenchConfig, Orchestrator, Reporter};
    use dmxp_qbench::Transport::mqueue::QueueLimits;
    use dmxp_qbench::Transport::{
        CompletionHandler, MqueueOptions, Transport, TransportError, TransportFactory,
        TransportSetupError,
    };
    use serial_test::serial;
    use std::sync::Arc;
    use std::time::Duration;

    struct Unused;

    impl CompletionHandler for Unused {
        fn on_complete(&self, _payload: &[u8]) {
            unreachable!("mqueue is pull-style");
        }
    }

    fn options(name: &str) -> MqueueOptions {
        MqueueOptions {
            name: name.to_string(),
            ..MqueueOptions::default()
        }
    }

    fn open(opts: &MqueueOptions, config: &BenchConfig) -> Option<Arc<dyn Transport>> {
        match opts.open(config, Arc::new(Unused)) {
            Ok(t) => Some(t),
            Err(TransportSetupError::Open { source, .. }) => {
                eprintln!("skipping: mqueue unavailable: {}", source);
                None
            }
            Err(e) => panic!("unexpected setup error: {}", e),
        }
    }

    #[test]
    #[serial]
    fn send_and_receive_round_trip() {
        let config = BenchConfig::new().with_message_size(64).with_max_in_flight(4);
        let Some(t) = open(&options("qbench_test_mq"), &config) else {
            return;
        };
        assert_eq!(t.identifier(), "/qbench_test_mq");

        t.send(b"hello mqueue", Duration::from_millis(100)).unwrap();
        let mut buf = Vec::new();
        let n = t.receive(&mut buf, Duration::from_millis(100)).unwrap();
        assert_eq!(&buf[..n], b"hello mqueue");

        assert!(matches!(
            t.receive(&mut buf, Duration::from_millis(20)),
            Err(TransportError::WouldBlock)
        ));
        t.close();
        assert!(matches!(
            t.send(b"x", Duration::ZERO),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    #[serial]
    fn oversize_message_is_a_setup_error() {
        let limits = QueueLimits::read();
        let config = BenchConfig::new().with_message_size(limits.msgsize_max as usize + 1);
        match options("qbench_test_mq_big").open(&config, Arc::new(Unused)) {
            Err(TransportSetupError::MessageTooLarge { limit, .. }) => {
                assert!(limit as i64 <= limits.msgsize_max)
            }
            Err(TransportSetupError::Open { .. }) => {}
            other => panic!("expected a setup error, got ok={}", other.is_ok()),
        }
    }

    #[test]
    #[serial]
    fn short_run_moves_messages() {
        let config = BenchConfig::new()
            .with_duration(Duration::from_millis(400))
            .with_print_interval(Duration::ZERO)
            .with_message_size(64)
            .with_max_in_flight(8);
        let opts = options("qbench_test_mq_run");
        if open(&opts, &config).is_none() {
            return;
        }

        let outcome = Orchestrator::new(config.clone())
            .unwrap()
            .run(&opts, &Reporter::from_config(&config))
            .unwrap();
        assert_eq!(outcome.backend, "mqueue");
        assert!(outcome.stats.recv_messages > 0);
        assert!(outcome.stats.recv_messages <= outcome.stats.sent_messages);
    }
}
