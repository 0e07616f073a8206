//! Command exchanges and relay-board configuration.

use std::time::Duration;

use brokerlink::command::{Command, CommandType, GpioOutput, OutputLevel, RelayBoardConfig};
use brokerlink::BrokerError;
use serde_json::json;

use crate::common::{Harness, TOKEN};

#[tokio::test]
async fn test_remote_disengage_resolves_on_domain_event() {
    let h = Harness::new().await;

    let response = h
        .client
        .remote_disengage("ip-7", true)
        .await
        .unwrap()
        .into_option()
        .expect("command timed out");

    assert_eq!(response.payload["installationPointId"], "ip-7");
    assert_eq!(response.payload["extended"], true);
    assert_eq!(
        response.payload["correlationId"],
        response.command_id.to_string()
    );

    let commands = h.remote.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].0, "RemoteDisengage");
    assert_eq!(commands[0].1["token"], TOKEN);
}

#[tokio::test]
async fn test_assignment_helpers_resolve() {
    let h = Harness::new().await;

    let profile = h
        .client
        .assign_authorization_profile_to_medium("ap-1", "m-1")
        .await
        .unwrap();
    let person = h.client.assign_person_to_medium("p-1", "m-1").await.unwrap();
    let permanent = h
        .client
        .remote_disengage_permanent("ip-1", false)
        .await
        .unwrap();

    assert_eq!(profile.into_option().unwrap().payload["authorizationProfileId"], "ap-1");
    assert_eq!(person.into_option().unwrap().payload["personId"], "p-1");
    assert_eq!(permanent.into_option().unwrap().payload["enable"], false);
    let types: Vec<String> = h.remote.commands().into_iter().map(|(t, _)| t).collect();
    assert_eq!(
        types,
        vec![
            "AssignAuthorizationProfileToMediumMapi",
            "AssignPersonToMediumMapi",
            "RemoteDisengagePermanent"
        ]
    );
}

#[tokio::test]
async fn test_command_error_response_is_remote_error() {
    let h = Harness::new().await;

    let err = h
        .client
        .send_command(Command::new(CommandType::Logout), None)
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::Remote(_)));
    assert_eq!(err.remote_payload().unwrap()["error"], "not logged in");
}

#[tokio::test]
async fn test_command_result_does_not_reach_event_subscribers() {
    let h = Harness::new().await;
    let mut events = h.client.events();

    h.client.remote_disengage("ip-1", false).await.unwrap();

    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_relay_board_configuration_is_fire_and_forget() {
    let h = Harness::new().await;
    let setup = RelayBoardConfig::Setup {
        o: vec![GpioOutput {
            gpio: 3,
            on: OutputLevel::High,
        }],
        i: None,
    };
    let output = RelayBoardConfig::Output {
        o: 3,
        timeout: Some(1500),
    };

    h.client.relay_board("rb-2", &setup).await.unwrap();
    h.client.relay_board("rb-2", &output).await.unwrap();

    // Arrival at the remote is asynchronous
    let mut relay = Vec::new();
    for _ in 0..100 {
        relay = h.remote.relay_messages();
        if relay.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(relay.len(), 2);
    assert_eq!(relay[0].0, "readers/addon/rb/1/rb-2/do");
    assert_eq!(relay[0].1, json!({"t": "c", "o": [{"gpio": 3, "on": "high"}]}));
    assert_eq!(relay[1].1, json!({"t": "o", "o": 3, "timeout": 1500}));
}

#[tokio::test]
async fn test_command_not_connected() {
    let h = Harness::new().await;
    h.client_transport.set_usable(false);

    let result = h.client.remote_disengage("ip-1", false).await;

    assert!(matches!(result, Err(BrokerError::NotConnected)));
    assert!(h.remote.commands().is_empty());
}
