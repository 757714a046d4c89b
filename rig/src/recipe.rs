// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The recipe run state machine.
//!
//! A run brackets every generated variant between configuration and
//! teardown: test-wide setup happens once, then each variant is
//! applied, its sub-tests (capture, ping, throughput) executed, and
//! its side effects removed before the next variant is touched.
//! Sub-test failures are recorded and the run continues; setup
//! failures abort the run after a best-effort teardown so no device
//! state leaks past a failed run.

use crate::axis::AxisChain;
use crate::capture::{evaluate_capture, CaptureHandle, PacketAssertConf};
use crate::endpoint::DevicePort;
use crate::error::Error;
use crate::perf::{FlowEvaluator, NonzeroFlowEvaluator, PerfConf};
use crate::ping::PingConf;
use crate::platform::{wait_for_condition, PerfTester, PingTester};
use crate::results::{ResultType, RunResults};
use crate::tracker::ConfigTracker;
use crate::variant::Variant;
use slog::{debug, info, warn, Logger};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    Init,
    TestWideConfigured,
    SubConfigured,
    SubTesting,
    SubTornDown,
    TestWideTornDown,
    Done,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::TestWideConfigured => write!(f, "test-wide configured"),
            Self::SubConfigured => write!(f, "sub configured"),
            Self::SubTesting => write!(f, "sub testing"),
            Self::SubTornDown => write!(f, "sub torn down"),
            Self::TestWideTornDown => write!(f, "test-wide torn down"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Mutable per-run context handed to the recipe's hooks: the address
/// ledger plus the ports the run touches.
pub struct RunCtx {
    pub tracker: ConfigTracker,
    ports: Vec<DevicePort>,
    pub log: Logger,
}

impl RunCtx {
    pub fn new(log: Logger) -> Self {
        Self {
            tracker: ConfigTracker::new(log.clone()),
            ports: Vec::new(),
            log,
        }
    }

    /// Register a port for run-level bookkeeping (tentative-address
    /// waits consult every registered port).
    pub fn add_port(&mut self, port: DevicePort) {
        self.ports.push(port);
    }

    pub fn ports(&self) -> &[DevicePort] {
        &self.ports
    }
}

/// The hooks one concrete test scenario implements. Defaults make
/// every sub-test kind opt-in.
pub trait Recipe {
    /// Configuration shared by all variants: address assignment,
    /// routing, port registration.
    fn test_wide_configuration(&mut self, ctx: &mut RunCtx)
        -> Result<(), Error>;

    /// Inverse of [`Recipe::test_wide_configuration`]. Also invoked,
    /// best effort, after a failed setup, so it must tolerate
    /// partially configured state.
    fn test_wide_deconfiguration(
        &mut self,
        ctx: &mut RunCtx,
    ) -> Result<(), Error>;

    fn describe_test_wide(&self, _ctx: &RunCtx) -> Vec<String> {
        Vec::new()
    }

    /// Ping configurations for one variant, batched; batches run in
    /// order, configurations within a batch belong together.
    fn ping_configs(
        &self,
        _ctx: &RunCtx,
        _variant: &Variant,
    ) -> Result<Vec<Vec<PingConf>>, Error> {
        Ok(Vec::new())
    }

    /// Throughput configurations for one variant.
    fn perf_configs(
        &self,
        _ctx: &RunCtx,
        _variant: &Variant,
    ) -> Result<Vec<PerfConf>, Error> {
        Ok(Vec::new())
    }

    /// Background capture to run while this variant's ping sub-tests
    /// execute.
    fn packet_assert(
        &self,
        _ctx: &RunCtx,
        _variant: &Variant,
    ) -> Option<PacketAssertConf> {
        None
    }

    fn perf_evaluators(&self) -> Vec<Box<dyn FlowEvaluator>> {
        vec![Box::new(NonzeroFlowEvaluator)]
    }
}

/// Drives one recipe over every variant an axis chain generates.
pub struct RecipeRunner {
    ping_tester: Arc<dyn PingTester>,
    perf_tester: Arc<dyn PerfTester>,
    tentative_timeout: Duration,
    tentative_poll: Duration,
    state: RunState,
    results: RunResults,
    log: Logger,
}

impl RecipeRunner {
    pub fn new(
        ping_tester: Arc<dyn PingTester>,
        perf_tester: Arc<dyn PerfTester>,
        log: Logger,
    ) -> Self {
        Self {
            ping_tester,
            perf_tester,
            tentative_timeout: Duration::from_secs(5),
            tentative_poll: Duration::from_millis(200),
            state: RunState::Init,
            results: RunResults::new(),
            log,
        }
    }

    pub fn with_tentative_timeout(
        mut self,
        timeout: Duration,
        poll: Duration,
    ) -> Self {
        self.tentative_timeout = timeout;
        self.tentative_poll = poll;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn results(&self) -> &RunResults {
        &self.results
    }

    /// Run `recipe` over every variant of `chain`. An `Err` means the
    /// run could not complete (a configuration step failed); failed
    /// sub-tests are reported through the returned overall result
    /// instead.
    pub fn run(
        &mut self,
        recipe: &mut dyn Recipe,
        chain: &AxisChain,
        ctx: &mut RunCtx,
    ) -> Result<ResultType, Error> {
        self.enter(RunState::Init);
        if let Err(e) = recipe.test_wide_configuration(ctx) {
            warn!(
                self.log,
                "test-wide setup failed: {e}, attempting teardown"
            );
            if let Err(td) = recipe.test_wide_deconfiguration(ctx) {
                warn!(
                    self.log,
                    "teardown after failed setup also failed: {td}"
                );
            }
            return Err(e);
        }
        self.enter(RunState::TestWideConfigured);
        let desc = recipe.describe_test_wide(ctx);
        if !desc.is_empty() {
            self.results.add_description(&desc);
        }

        let outcome = self.run_variants(recipe, chain, ctx);

        if let Err(e) = recipe.test_wide_deconfiguration(ctx) {
            warn!(self.log, "test-wide teardown failure: {e}, continuing");
        }
        self.enter(RunState::TestWideTornDown);
        outcome?;
        self.enter(RunState::Done);
        Ok(self.results.overall())
    }

    fn run_variants(
        &mut self,
        recipe: &mut dyn Recipe,
        chain: &AxisChain,
        ctx: &mut RunCtx,
    ) -> Result<(), Error> {
        for variant in chain.generate(Variant::new()) {
            self.run_one_variant(recipe, chain, ctx, &variant)?;
        }
        Ok(())
    }

    fn run_one_variant(
        &mut self,
        recipe: &mut dyn Recipe,
        chain: &AxisChain,
        ctx: &mut RunCtx,
        variant: &Variant,
    ) -> Result<(), Error> {
        if let Err(e) = chain.apply_all(variant) {
            // a partially applied variant still needs its cleanup
            chain.remove_all(variant);
            return Err(e);
        }
        self.enter(RunState::SubConfigured);
        chain.log_description(variant);
        self.results.add_description(&chain.describe_all(variant));

        if let Err(e) = wait_tentative_clear(
            ctx.ports(),
            self.tentative_timeout,
            self.tentative_poll,
        ) {
            chain.remove_all(variant);
            return Err(e);
        }

        self.enter(RunState::SubTesting);
        self.run_sub_tests(recipe, ctx, variant);
        self.enter(RunState::SubTornDown);
        chain.remove_all(variant);
        Ok(())
    }

    fn run_sub_tests(
        &mut self,
        recipe: &mut dyn Recipe,
        ctx: &RunCtx,
        variant: &Variant,
    ) {
        let mut capture = None;
        if let Some(conf) = recipe.packet_assert(ctx, variant) {
            let mut handle = CaptureHandle::new(self.log.clone());
            match handle.start(&conf) {
                Ok(()) => capture = Some((handle, conf)),
                Err(e) => self.results.add_sub_test(
                    ResultType::Fail,
                    format!("{}: failed to start: {e}", conf.describe()),
                ),
            }
        }

        match recipe.ping_configs(ctx, variant) {
            Ok(batches) => {
                for batch in batches {
                    for conf in &batch {
                        self.run_ping(conf);
                    }
                }
            }
            Err(e) => self.results.add_sub_test(
                ResultType::Fail,
                format!("ping configuration failed: {e}"),
            ),
        }

        if let Some((mut handle, conf)) = capture {
            match handle.stop() {
                Ok(result) => {
                    let (status, lines) = evaluate_capture(&conf, &result);
                    self.results.add_sub_test(status, lines.join("\n"));
                }
                Err(e) => self.results.add_sub_test(
                    ResultType::Fail,
                    format!("{}: {e}", conf.describe()),
                ),
            }
        }

        match recipe.perf_configs(ctx, variant) {
            Ok(confs) => {
                let evaluators = recipe.perf_evaluators();
                for conf in &confs {
                    self.run_perf(conf, &evaluators);
                }
            }
            Err(e) => self.results.add_sub_test(
                ResultType::Fail,
                format!("flow configuration failed: {e}"),
            ),
        }
    }

    fn run_ping(&mut self, conf: &PingConf) {
        info!(self.log, "running ping: {}", conf.describe());
        match self.ping_tester.run(conf) {
            Ok(result) => {
                self.results.add_sub_test(
                    ResultType::Pass,
                    format!(
                        "Ping result --- {}: {}/{} received, rate {}%",
                        conf.describe(),
                        result.received,
                        result.sent,
                        result.rate,
                    ),
                );
                for evaluator in &conf.evaluators {
                    let (status, lines) = evaluator.evaluate(&result);
                    self.results.add_sub_test(
                        status,
                        format!("{}\n{}", conf.describe(), lines.join("\n")),
                    );
                }
            }
            Err(e) => self.results.add_sub_test(
                ResultType::Fail,
                format!("Ping failed --- {}: {e}", conf.describe()),
            ),
        }
    }

    fn run_perf(
        &mut self,
        conf: &PerfConf,
        evaluators: &[Box<dyn FlowEvaluator>],
    ) {
        info!(
            self.log,
            "measuring {} flows, {} iterations",
            conf.flows.len(),
            conf.iterations
        );
        match self.perf_tester.run(conf) {
            Ok(result) => {
                for evaluator in evaluators {
                    let (status, lines) = evaluator.evaluate(conf, &result);
                    self.results.add_sub_test(status, lines.join("\n"));
                }
            }
            Err(e) => self.results.add_sub_test(
                ResultType::Fail,
                format!("flow measurement failed: {e}"),
            ),
        }
    }

    fn enter(&mut self, next: RunState) {
        debug!(self.log, "run state {} -> {next}", self.state);
        self.state = next;
    }
}

/// Block until no registered port reports a tentative address, so
/// sub-tests never race duplicate address detection.
pub fn wait_tentative_clear(
    ports: &[DevicePort],
    timeout: Duration,
    poll: Duration,
) -> Result<(), Error> {
    wait_for_condition(
        || {
            for port in ports {
                if port.device.addresses()?.iter().any(|a| a.is_tentative())
                {
                    return Ok(false);
                }
            }
            Ok(true)
        },
        timeout,
        poll,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::endpoint::ip_endpoint_pairs;
    use crate::ipver::IpVersionAxis;
    use crate::offload::{OffloadAxis, OffloadCombination};
    use crate::ping::{generate_ping_configs, PingParams, PingResult};
    use crate::sim::{sim_port, SimNetns, SimPerfTester, SimPingTester};
    use crate::variant::AxisId;
    use pretty_assertions::assert_eq;
    use rig_common::ifaddr;
    use rig_common::lock;
    use rig_common::net::AddrFamily;
    use std::sync::Mutex;

    fn test_logger() -> Logger {
        rig_common::log::build_logger(std::io::stdout())
    }

    struct TestRecipe {
        ports: Vec<DevicePort>,
        events: Arc<Mutex<Vec<String>>>,
        fail_setup: bool,
        ping_params: PingParams,
        packet_assert: Option<PacketAssertConf>,
    }

    impl TestRecipe {
        fn new(ports: Vec<DevicePort>) -> Self {
            Self {
                ports,
                events: Arc::new(Mutex::new(Vec::new())),
                fail_setup: false,
                ping_params: PingParams::default(),
                packet_assert: None,
            }
        }
    }

    impl Recipe for TestRecipe {
        fn test_wide_configuration(
            &mut self,
            ctx: &mut RunCtx,
        ) -> Result<(), Error> {
            lock!(self.events).push("setup".to_string());
            if self.fail_setup {
                return Err(Error::Config("injected setup failure".into()));
            }
            let (a, b) = (&self.ports[0], &self.ports[1]);
            ctx.tracker.assign_and_track(
                a.device.as_ref(),
                ifaddr!("192.168.101.1/24"),
                None,
            )?;
            ctx.tracker.assign_and_track(
                a.device.as_ref(),
                ifaddr!("fc00::1/64"),
                None,
            )?;
            ctx.tracker.assign_and_track(
                b.device.as_ref(),
                ifaddr!("192.168.101.2/24"),
                None,
            )?;
            ctx.tracker.assign_and_track(
                b.device.as_ref(),
                ifaddr!("fc00::2/64"),
                None,
            )?;
            for port in &self.ports {
                ctx.add_port(port.clone());
            }
            Ok(())
        }

        fn test_wide_deconfiguration(
            &mut self,
            _ctx: &mut RunCtx,
        ) -> Result<(), Error> {
            lock!(self.events).push("teardown".to_string());
            Ok(())
        }

        fn describe_test_wide(&self, _ctx: &RunCtx) -> Vec<String> {
            vec!["two hosts, one NIC each".to_string()]
        }

        fn ping_configs(
            &self,
            ctx: &RunCtx,
            variant: &Variant,
        ) -> Result<Vec<Vec<PingConf>>, Error> {
            let pairs = ip_endpoint_pairs(
                &ctx.tracker,
                &self.ports[0],
                &self.ports[1],
                &[AddrFamily::V4, AddrFamily::V6],
            )?;
            Ok(generate_ping_configs(variant, &pairs, &self.ping_params))
        }

        fn packet_assert(
            &self,
            _ctx: &RunCtx,
            _variant: &Variant,
        ) -> Option<PacketAssertConf> {
            self.packet_assert.clone()
        }
    }

    fn offload_ipver_chain(port: DevicePort) -> AxisChain {
        AxisChain::new(
            vec![
                Box::new(OffloadAxis::new(
                    vec![port],
                    vec![
                        OffloadCombination::from_pairs(&[("gro", true)]),
                        OffloadCombination::from_pairs(&[("gro", false)]),
                    ],
                    test_logger(),
                )),
                Box::new(IpVersionAxis::all()),
            ],
            test_logger(),
        )
        .expect("valid chain")
    }

    fn two_host_setup() -> (Arc<SimNetns>, Arc<SimNetns>, Vec<DevicePort>) {
        let ns1 = SimNetns::new("host1");
        let ns2 = SimNetns::new("host2");
        let a = sim_port(&ns1, "eth0");
        let b = sim_port(&ns2, "eth0");
        (ns1, ns2, vec![a, b])
    }

    #[test]
    fn full_matrix_run_passes() {
        let (ns1, _ns2, ports) = two_host_setup();
        let chain = offload_ipver_chain(ports[0].clone());
        let mut recipe = TestRecipe::new(ports);
        let ping = SimPingTester::new();
        let perf = SimPerfTester::new();
        let mut runner = RecipeRunner::new(
            ping.clone(),
            perf.clone(),
            test_logger(),
        );
        let mut ctx = RunCtx::new(test_logger());

        let overall = runner.run(&mut recipe, &chain, &mut ctx).unwrap();
        assert_eq!(overall, ResultType::Pass);
        assert_eq!(runner.state(), RunState::Done);

        // 2 offload combinations x 2 ip versions.
        let descriptions: Vec<&str> = runner
            .results()
            .records()
            .iter()
            .filter(|r| !r.sub_test)
            .map(|r| r.description.as_str())
            .collect();
        let variant_descs: Vec<&&str> = descriptions
            .iter()
            .filter(|d| d.starts_with("Sub configuration description:"))
            .collect();
        assert_eq!(variant_descs.len(), 4);
        assert_eq!(
            variant_descs
                .iter()
                .filter(|d| d.contains("Testing IP version: ipv4"))
                .count(),
            2
        );
        assert_eq!(
            variant_descs
                .iter()
                .filter(|d| d.contains("gro=off"))
                .count(),
            2
        );

        // One ping per variant, its family following the variant.
        let runs = ping.runs();
        assert_eq!(runs.len(), 4);
        assert_eq!(
            runs.iter()
                .filter(|c| c.client.family() == AddrFamily::V4)
                .count(),
            2
        );

        // Every offload apply is paired with a reset before the next
        // variant.
        let ethtool: Vec<String> = ns1
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("ethtool -K"))
            .collect();
        assert_eq!(ethtool.len(), 8);
        assert_eq!(
            lock!(recipe.events).as_slice(),
            ["setup".to_string(), "teardown".to_string()]
        );
    }

    #[test]
    fn failed_ping_fails_run_but_continues() {
        let (ns1, _ns2, ports) = two_host_setup();
        let chain = offload_ipver_chain(ports[0].clone());
        let mut recipe = TestRecipe::new(ports);
        let ping = SimPingTester::new();
        // First variant's probe loses everything, the rest succeed.
        ping.queue_result(Ok(PingResult {
            sent: 100,
            received: 0,
            rate: 0,
        }));
        let mut runner = RecipeRunner::new(
            ping.clone(),
            SimPerfTester::new(),
            test_logger(),
        );
        let mut ctx = RunCtx::new(test_logger());

        let overall = runner.run(&mut recipe, &chain, &mut ctx).unwrap();
        assert_eq!(overall, ResultType::Fail);
        assert_eq!(runner.state(), RunState::Done);
        // All four variants still ran.
        assert_eq!(ping.runs().len(), 4);
        let failed: Vec<_> = runner
            .results()
            .sub_tests()
            .filter(|r| r.result == ResultType::Fail)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].description.contains("less than min_rate(50)"));
    }

    #[test]
    fn failed_setup_still_attempts_teardown() {
        let (ns1, _ns2, ports) = two_host_setup();
        let chain = offload_ipver_chain(ports[0].clone());
        let mut recipe = TestRecipe::new(ports);
        recipe.fail_setup = true;
        let events = recipe.events.clone();
        let mut runner = RecipeRunner::new(
            SimPingTester::new(),
            SimPerfTester::new(),
            test_logger(),
        );
        let mut ctx = RunCtx::new(test_logger());

        assert!(runner.run(&mut recipe, &chain, &mut ctx).is_err());
        assert_eq!(
            lock!(events).as_slice(),
            ["setup".to_string(), "teardown".to_string()]
        );
        assert_eq!(runner.state(), RunState::Init);
        assert!(ns1.commands().is_empty());
    }

    struct FlakyAxis {
        removed: Arc<Mutex<Vec<String>>>,
    }

    impl crate::axis::ConfigAxis for FlakyAxis {
        fn id(&self) -> AxisId {
            AxisId("flaky")
        }

        fn generate(&self, base: &Variant) -> Vec<Variant> {
            ["ok", "bad"]
                .iter()
                .map(|label| {
                    let mut v = base.clone();
                    v.attach(AxisId("flaky"), *label);
                    v
                })
                .collect()
        }

        fn apply(&self, variant: &Variant) -> Result<(), Error> {
            match variant.get::<&'static str>(AxisId("flaky")) {
                Some(&"bad") => {
                    Err(Error::Config("injected apply failure".into()))
                }
                _ => Ok(()),
            }
        }

        fn remove(&self, variant: &Variant) -> Result<(), Error> {
            if let Some(label) = variant.get::<&'static str>(AxisId("flaky"))
            {
                lock!(self.removed).push(label.to_string());
            }
            Ok(())
        }

        fn describe(&self, _variant: &Variant) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn failed_apply_tears_down_variant_and_run() {
        let (_ns1, _ns2, ports) = two_host_setup();
        let removed = Arc::new(Mutex::new(Vec::new()));
        let chain = AxisChain::new(
            vec![Box::new(FlakyAxis {
                removed: removed.clone(),
            })],
            test_logger(),
        )
        .unwrap();
        let mut recipe = TestRecipe::new(ports);
        let events = recipe.events.clone();
        let ping = SimPingTester::new();
        let mut runner = RecipeRunner::new(
            ping.clone(),
            SimPerfTester::new(),
            test_logger(),
        );
        let mut ctx = RunCtx::new(test_logger());

        assert!(runner.run(&mut recipe, &chain, &mut ctx).is_err());
        // The first variant ran and was torn down; the second failed
        // to apply and was still cleaned up; test-wide teardown ran.
        assert_eq!(
            lock!(removed).as_slice(),
            ["ok".to_string(), "bad".to_string()]
        );
        assert_eq!(
            lock!(events).as_slice(),
            ["setup".to_string(), "teardown".to_string()]
        );
        assert_eq!(runner.state(), RunState::TestWideTornDown);
        assert_eq!(ping.runs().len(), 2);
    }

    #[test]
    fn capture_brackets_ping_sub_tests() {
        let (ns1, ns2, ports) = two_host_setup();
        let chain =
            AxisChain::new(vec![Box::new(IpVersionAxis::all())], test_logger())
                .unwrap();
        let mut recipe = TestRecipe::new(ports);
        recipe.packet_assert = Some(PacketAssertConf {
            netns: ns2.clone(),
            iface: "eth0".to_string(),
            filter: "icmp or icmp6".to_string(),
            min_packets: 1,
            max_packets: 0,
            promiscuous: false,
        });
        ns2.queue_background_result(serde_json::json!({ "p_recv": 100 }));
        ns2.queue_background_result(serde_json::json!({ "p_recv": 100 }));

        let mut runner = RecipeRunner::new(
            SimPingTester::new(),
            SimPerfTester::new(),
            test_logger(),
        );
        let mut ctx = RunCtx::new(test_logger());
        let overall = runner.run(&mut recipe, &chain, &mut ctx).unwrap();
        assert_eq!(overall, ResultType::Pass);

        // One capture per variant, each stopped with SIGINT.
        assert_eq!(ns2.commands().len(), 2);
        assert_eq!(ns2.signals(), vec![crate::platform::SIGINT; 2]);
        assert!(ns1.commands().is_empty());
        let capture_records: Vec<_> = runner
            .results()
            .sub_tests()
            .filter(|r| r.description.contains("PacketAssert"))
            .collect();
        assert_eq!(capture_records.len(), 2);
        assert!(capture_records
            .iter()
            .all(|r| r.result == ResultType::Pass));
    }

    #[test]
    fn run_waits_for_tentative_addresses() {
        let (ns1, _ns2, ports) = two_host_setup();
        let chain = AxisChain::new(
            vec![Box::new(IpVersionAxis::new(vec![AddrFamily::V6]))],
            test_logger(),
        )
        .unwrap();
        let mut recipe = TestRecipe::new(ports);
        // Addresses stay tentative for the first two polls.
        let dev = ns1.device("eth0").expect("registered");
        dev.set_tentative_polls(2);

        let ping = SimPingTester::new();
        let mut runner = RecipeRunner::new(
            ping.clone(),
            SimPerfTester::new(),
            test_logger(),
        )
        .with_tentative_timeout(
            Duration::from_secs(1),
            Duration::from_millis(1),
        );
        let mut ctx = RunCtx::new(test_logger());
        let overall = runner.run(&mut recipe, &chain, &mut ctx).unwrap();
        assert_eq!(overall, ResultType::Pass);
        assert_eq!(ping.runs().len(), 1);
    }

    #[test]
    fn tentative_timeout_aborts_run() {
        let (ns1, _ns2, ports) = two_host_setup();
        let chain = AxisChain::new(
            vec![Box::new(IpVersionAxis::all())],
            test_logger(),
        )
        .unwrap();
        let mut recipe = TestRecipe::new(ports);
        let dev = ns1.device("eth0").expect("registered");
        dev.set_tentative_polls(u32::MAX);

        let mut runner = RecipeRunner::new(
            SimPingTester::new(),
            SimPerfTester::new(),
            test_logger(),
        )
        .with_tentative_timeout(
            Duration::from_millis(5),
            Duration::from_millis(1),
        );
        let mut ctx = RunCtx::new(test_logger());
        let r = runner.run(&mut recipe, &chain, &mut ctx);
        assert!(matches!(r, Err(Error::Timeout(_))));
        assert_eq!(runner.state(), RunState::TestWideTornDown);
    }
}
