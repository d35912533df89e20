//! Tests for the EC2 client.

use rstest::{fixture, rstest};

use super::*;
use crate::signer::{HEADER_AUTHORIZATION, HEADER_HOST};
use crate::test_support::{ScriptedGateway, StaticParameters, value};

const INSTANCES: &str = r"<DescribeInstancesResponse>
  <reservationSet>
    <item><instancesSet>
      <item>
        <instanceId>i-0123456789abcdef0</instanceId>
        <instanceState><code>16</code><name>running</name></instanceState>
        <placement><availabilityZone>eu-west-1b</availabilityZone></placement>
        <vpcId>vpc-1</vpcId>
        <privateIpAddress>10.0.0.5</privateIpAddress>
        <privateDnsName>ip-10-0-0-5.internal</privateDnsName>
        <tagSet>
          <item><key>name</key><value>Web Front</value></item>
          <item><key>description</key><value>public site</value></item>
        </tagSet>
      </item>
    </instancesSet></item>
    <item><instancesSet>
      <item>
        <instanceId>i-0fff</instanceId>
        <instanceState><code>64</code><name>stopping</name></instanceState>
      </item>
      <item>
        <instanceId>i-0aaa</instanceId>
        <instanceState><code>80</code><name>stopped</name></instanceState>
        <tagSet><item><key>Name</key><value>batch</value></item></tagSet>
      </item>
    </instancesSet></item>
  </reservationSet>
</DescribeInstancesResponse>";

#[fixture]
fn parameters() -> SubscriptionParameters {
    StaticParameters::sample(1)
        .subscription_parameters()
        .clone()
}

fn client(gateway: &ScriptedGateway) -> Ec2Client<ScriptedGateway> {
    Ec2Client::new(gateway.clone())
}

#[test]
fn query_body_is_form_encoded_with_version_last() {
    let query = QueryAction::new("CreateImage")
        .param("Name", "vmsnap-snapshot/1/2024-01-02_03-04-05")
        .param("Description", "Snapshot created from vmsnap");

    assert_eq!(query.action(), "CreateImage");
    assert_eq!(
        query.body("2016-11-15"),
        concat!(
            "Action=CreateImage",
            "&Name=vmsnap-snapshot%2F1%2F2024-01-02_03-04-05",
            "&Description=Snapshot+created+from+vmsnap",
            "&Version=2016-11-15"
        )
    );
}

#[rstest]
#[tokio::test]
async fn process_signs_form_request_for_default_region(parameters: SubscriptionParameters) {
    let gateway = ScriptedGateway::new().respond(&[("Action", "DescribeImages")], "<ok/>");

    let response = client(&gateway)
        .process(&parameters, &QueryAction::new("DescribeImages"))
        .await
        .unwrap_or_else(|err| panic!("process: {err}"));

    assert_eq!(response.as_deref(), Some("<ok/>"));
    let requests = gateway.requests();
    let request = requests.first().unwrap_or_else(|| panic!("one request"));
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "https://ec2.eu-west-1.amazonaws.com/");
    assert_eq!(
        request.headers.get("Content-Type").map(String::as_str),
        Some(FORM_CONTENT_TYPE)
    );
    assert_eq!(
        request.headers.get(HEADER_HOST).map(String::as_str),
        Some("ec2.eu-west-1.amazonaws.com")
    );
    let authorization = request
        .headers
        .get(HEADER_AUTHORIZATION)
        .cloned()
        .unwrap_or_default();
    assert!(authorization.contains("/eu-west-1/ec2/aws4_request"));
    assert!(authorization.contains("SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date"));
    assert_eq!(
        request.body.as_deref(),
        Some("Action=DescribeImages&Version=2016-11-15")
    );
}

#[rstest]
#[tokio::test]
async fn process_prefers_subscription_region(mut parameters: SubscriptionParameters) {
    parameters.region = Some(String::from("us-east-2"));
    let gateway = ScriptedGateway::new();

    let response = client(&gateway)
        .process(&parameters, &QueryAction::new("DescribeImages"))
        .await
        .unwrap_or_else(|err| panic!("process: {err}"));

    assert_eq!(response, None);
    let urls = gateway
        .requests()
        .into_iter()
        .map(|request| request.url)
        .collect::<Vec<_>>();
    assert_eq!(urls, vec![String::from("https://ec2.us-east-2.amazonaws.com/")]);
}

#[rstest]
#[tokio::test]
async fn endpoint_override_replaces_url_only(parameters: SubscriptionParameters) {
    let gateway = ScriptedGateway::new();
    let settings = ClientSettings {
        endpoint: Some(String::from("http://127.0.0.1:9000/")),
        ..ClientSettings::default()
    };

    Ec2Client::with_settings(gateway.clone(), settings)
        .process(&parameters, &QueryAction::new("DescribeImages"))
        .await
        .unwrap_or_else(|err| panic!("process: {err}"));

    let requests = gateway.requests();
    let request = requests.first().unwrap_or_else(|| panic!("one request"));
    assert_eq!(request.url, "http://127.0.0.1:9000/");
    assert_eq!(
        request.headers.get(HEADER_HOST).map(String::as_str),
        Some("ec2.eu-west-1.amazonaws.com")
    );
}

#[rstest]
#[tokio::test]
async fn process_rejects_blank_credentials(mut parameters: SubscriptionParameters) {
    parameters.secret_access_key = String::from("  ");
    let gateway = ScriptedGateway::new();

    let err = client(&gateway)
        .process(&parameters, &QueryAction::new("DescribeImages"))
        .await
        .expect_err("blank secret should fail");

    assert_eq!(
        err,
        Ec2Error::Signature(crate::signer::SignatureError::MissingField("secret_key"))
    );
    assert!(gateway.requests().is_empty());
}

#[rstest]
#[tokio::test]
async fn vm_details_maps_instance(parameters: SubscriptionParameters) {
    let gateway = ScriptedGateway::new().respond(
        &[
            ("Action", "DescribeInstances"),
            ("Filter.1.Name", "instance-id"),
            ("Filter.1.Value.1", "i-0123456789abcdef0"),
        ],
        INSTANCES,
    );

    let vm = client(&gateway)
        .vm_details(&parameters)
        .await
        .unwrap_or_else(|err| panic!("details: {err}"));

    assert_eq!(vm.id, "i-0123456789abcdef0");
    assert_eq!(vm.name, "Web Front");
    assert_eq!(vm.description.as_deref(), Some("public site"));
    assert_eq!(vm.status, Some(VmStatus::PoweredOn));
    assert!(vm.deployed);
    assert!(!vm.busy);
    assert_eq!(vm.vpc.as_deref(), Some("vpc-1"));
    assert_eq!(vm.az.as_deref(), Some("eu-west-1b"));
    assert_eq!(
        vm.networks,
        vec![VmNetwork {
            kind: String::from("private"),
            ip: String::from("10.0.0.5"),
            dns: Some(String::from("ip-10-0-0-5.internal")),
        }]
    );
    assert_eq!(vm.label(), "Web Front,i-0123456789abcdef0");
}

#[rstest]
#[tokio::test]
async fn vm_details_reports_missing_instance(parameters: SubscriptionParameters) {
    let gateway = ScriptedGateway::new().respond(
        &[("Action", "DescribeInstances")],
        "<DescribeInstancesResponse><reservationSet/></DescribeInstancesResponse>",
    );

    let err = client(&gateway)
        .vm_details(&parameters)
        .await
        .expect_err("missing instance");

    assert_eq!(
        err,
        Ec2Error::InstanceNotFound {
            instance_id: String::from("i-0123456789abcdef0"),
        }
    );
}

#[rstest]
#[tokio::test]
async fn vm_details_rejects_non_xml_listing(parameters: SubscriptionParameters) {
    let gateway = ScriptedGateway::new().respond(&[("Action", "DescribeInstances")], "<<<");

    let err = client(&gateway)
        .vm_details(&parameters)
        .await
        .expect_err("garbage listing");

    assert!(matches!(err, Ec2Error::DescribeInstancesFailed { .. }), "{err}");
}

#[rstest]
#[case::all("", &["Web Front", "batch", "i-0fff"])]
#[case::by_id("I-0F", &["i-0fff"])]
#[case::by_name("web", &["Web Front"])]
#[case::none("nothing", &[])]
#[tokio::test]
async fn find_instances_filters_and_sorts(
    parameters: SubscriptionParameters,
    #[case] criteria: &str,
    #[case] expected: &[&str],
) {
    let gateway = ScriptedGateway::new().respond(&[("Action", "DescribeInstances")], INSTANCES);

    let names = client(&gateway)
        .find_instances(&parameters, criteria)
        .await
        .unwrap_or_else(|err| panic!("find: {err}"))
        .into_iter()
        .map(|vm| vm.name)
        .collect::<Vec<_>>();

    assert_eq!(names, expected);
    assert_eq!(
        gateway.calls().first().map(Vec::len),
        Some(2),
        "listing sends no filter"
    );
}

#[rstest]
#[tokio::test]
async fn find_instances_of_absent_listing_is_empty(parameters: SubscriptionParameters) {
    let gateway = ScriptedGateway::new();

    let vms = client(&gateway)
        .find_instances(&parameters, "")
        .await
        .unwrap_or_else(|err| panic!("find: {err}"));

    assert!(vms.is_empty());
}

#[rstest]
#[case::on(VmOperation::On, "StartInstances", None)]
#[case::off(VmOperation::Off, "StopInstances", Some("true"))]
#[case::shutdown(VmOperation::Shutdown, "StopInstances", None)]
#[case::reboot(VmOperation::Reboot, "RebootInstances", None)]
#[case::reset(VmOperation::Reset, "RebootInstances", None)]
#[tokio::test]
async fn execute_maps_operation_to_action(
    parameters: SubscriptionParameters,
    #[case] operation: VmOperation,
    #[case] action: &str,
    #[case] force: Option<&str>,
) {
    let gateway = ScriptedGateway::new()
        .respond(&[("Action", "DescribeInstances")], INSTANCES)
        .respond(
            &[("Action", action)],
            "<Response><return>true</return></Response>",
        );

    let label = client(&gateway)
        .execute(&parameters, operation)
        .await
        .unwrap_or_else(|err| panic!("execute: {err}"));

    assert_eq!(label, "Web Front,i-0123456789abcdef0");
    let calls = gateway.calls();
    let call = calls.last().unwrap_or_else(|| panic!("operation call"));
    assert_eq!(value(call, "Action"), Some(action));
    assert_eq!(value(call, "InstanceId.1"), Some("i-0123456789abcdef0"));
    assert_eq!(value(call, "Force"), force);
}

#[rstest]
#[tokio::test]
async fn execute_accepts_state_transitions(parameters: SubscriptionParameters) {
    let gateway = ScriptedGateway::new()
        .respond(&[("Action", "DescribeInstances")], INSTANCES)
        .respond(
            &[("Action", "StopInstances")],
            r"<StopInstancesResponse><instancesSet><item>
  <instanceId>i-0123456789abcdef0</instanceId>
  <currentState><code>64</code></currentState>
  <previousState><code>16</code></previousState>
</item></instancesSet></StopInstancesResponse>",
        );

    let result = client(&gateway)
        .execute(&parameters, VmOperation::Shutdown)
        .await;

    assert!(result.is_ok(), "{result:?}");
}

#[rstest]
#[case::absent(None)]
#[case::refused(Some("<Response><return>false</return></Response>"))]
#[case::empty_transitions(Some("<StartInstancesResponse><instancesSet/></StartInstancesResponse>"))]
#[tokio::test]
async fn execute_fails_without_acknowledgement(
    parameters: SubscriptionParameters,
    #[case] response: Option<&str>,
) {
    let scripted = ScriptedGateway::new().respond(&[("Action", "DescribeInstances")], INSTANCES);
    let gateway = match response {
        Some(body) => scripted.respond(&[("Action", "StartInstances")], body),
        None => scripted.fail(&[("Action", "StartInstances")]),
    };

    let err = client(&gateway)
        .execute(&parameters, VmOperation::On)
        .await
        .expect_err("operation should fail");

    assert_eq!(
        err,
        Ec2Error::OperationFailed {
            operation: VmOperation::On,
            instance_id: String::from("i-0123456789abcdef0"),
        }
    );
}

#[rstest]
#[case::reachable(true)]
#[case::unreachable(false)]
#[tokio::test]
async fn validate_access_calls_security_token_service(
    parameters: SubscriptionParameters,
    #[case] reachable: bool,
) {
    let pairs = [("Action", "GetCallerIdentity"), ("Version", STS_API_VERSION)];
    let gateway = if reachable {
        ScriptedGateway::new().respond(&pairs, "<GetCallerIdentityResponse/>")
    } else {
        ScriptedGateway::new().fail(&pairs)
    };

    let valid = client(&gateway)
        .validate_access(&parameters)
        .await
        .unwrap_or_else(|err| panic!("validate: {err}"));

    assert_eq!(valid, reachable);
    let urls = gateway
        .requests()
        .into_iter()
        .map(|request| request.url)
        .collect::<Vec<_>>();
    assert_eq!(urls, vec![String::from("https://sts.eu-west-1.amazonaws.com/")]);
}

#[rstest]
#[case(0, Some(VmStatus::PoweredOn), true)]
#[case(16, Some(VmStatus::PoweredOn), false)]
#[case(32, Some(VmStatus::PoweredOff), true)]
#[case(48, Some(VmStatus::PoweredOff), false)]
#[case(64, Some(VmStatus::PoweredOff), true)]
#[case(80, Some(VmStatus::PoweredOff), false)]
#[case(99, None, false)]
#[tokio::test]
async fn state_codes_map_to_status_and_busy(
    parameters: SubscriptionParameters,
    #[case] code: i32,
    #[case] status: Option<VmStatus>,
    #[case] busy: bool,
) {
    let listing = format!(
        "<DescribeInstancesResponse><reservationSet><item><instancesSet><item>\
         <instanceId>i-0123456789abcdef0</instanceId>\
         <instanceState><code>{code}</code></instanceState>\
         </item></instancesSet></item></reservationSet></DescribeInstancesResponse>"
    );
    let gateway = ScriptedGateway::new().respond(&[("Action", "DescribeInstances")], &listing);

    let vm = client(&gateway)
        .vm_details(&parameters)
        .await
        .unwrap_or_else(|err| panic!("details: {err}"));

    assert_eq!(vm.status, status);
    assert_eq!(vm.busy, busy);
    assert_eq!(vm.deployed, status == Some(VmStatus::PoweredOn));
    assert_eq!(vm.name, "i-0123456789abcdef0");
}
