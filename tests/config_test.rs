mod common;

use common::{addr, init_tracing};
use dca_hub::{
    DcaHub, FixedRateOracle, HubConfig, HubError, InMemoryPermissionRegistry, InMemoryTokenLedger,
    SwapInterval, SystemClock,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

fn build(config: HubConfig) -> Result<DcaHub<InMemoryTokenLedger>, HubError> {
    init_tracing();
    DcaHub::new(
        config,
        InMemoryTokenLedger::new(),
        Arc::new(FixedRateOracle::new()),
        Arc::new(InMemoryPermissionRegistry::new()),
        Arc::new(SystemClock),
    )
}

#[test]
fn test_hub_from_env_map() {
    let env_map: HashMap<String, String> = [
        ("DCA_HUB_ADDRESS", "0xhub"),
        ("DCA_FEE_RECIPIENT", "0xfees"),
        ("DCA_SWAP_FEE", "0.3"),
        ("DCA_ALLOWED_INTERVALS", "15m,1h"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let hub = build(HubConfig::from_env_map(env_map).unwrap()).unwrap();

    assert_eq!(hub.address(), &addr("hub"));
    assert_eq!(hub.fee_recipient(), &addr("fees"));
    assert_eq!(hub.swap_fee(), 3_000);
    assert_eq!(hub.loan_fee(), 1_000);
    assert_eq!(
        hub.allowed_intervals(),
        vec![SwapInterval::FIFTEEN_MINUTES, SwapInterval::ONE_HOUR]
    );
}

#[test]
fn test_hub_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"hub_address":"0xhub","fee_recipient":"0xfees","loan_fee":500}}"#
    )
    .unwrap();
    let hub = build(HubConfig::from_json_file(file.path()).unwrap()).unwrap();

    assert_eq!(hub.swap_fee(), 6_000);
    assert_eq!(hub.loan_fee(), 500);
    assert_eq!(hub.allowed_intervals().len(), 6);
}

#[test]
fn test_hub_rejects_bad_config() {
    let config = HubConfig::new(addr("hub"), addr("fees"));
    assert_eq!(
        build(config.clone().with_swap_fee(100_001)).unwrap_err(),
        HubError::HighFee(100_001)
    );
    assert_eq!(
        build(config.clone().with_loan_fee(250_000)).unwrap_err(),
        HubError::HighFee(250_000)
    );
    assert_eq!(
        build(config.clone().with_allowed_intervals(vec![SwapInterval(0)])).unwrap_err(),
        HubError::InvalidInterval(SwapInterval(0))
    );
    assert_eq!(
        build(HubConfig::new(addr("hub"), dca_hub::Address::zero())).unwrap_err(),
        HubError::ZeroAddress
    );
}

#[test]
fn test_allow_swap_intervals_extends_list() {
    let mut hub = build(
        HubConfig::new(addr("hub"), addr("fees"))
            .with_allowed_intervals(vec![SwapInterval::ONE_HOUR]),
    )
    .unwrap();
    hub.allow_swap_intervals(&[SwapInterval(120), SwapInterval::ONE_HOUR])
        .unwrap();
    assert_eq!(
        hub.allowed_intervals(),
        vec![SwapInterval(120), SwapInterval::ONE_HOUR]
    );
    assert_eq!(
        hub.allow_swap_intervals(&[SwapInterval(0)]).unwrap_err(),
        HubError::InvalidInterval(SwapInterval(0))
    );
    assert_eq!(hub.allowed_intervals().len(), 2);
}
