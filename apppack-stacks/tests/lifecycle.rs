use std::sync::Arc;
use std::time::Duration;

use apppack_core::params::find;
use apppack_core::provider::{ChangeSetType, HostedZone};
use apppack_core::testing::{Call, FakeCloud, ScriptedPrompter};
use apppack_core::{
    EngineError, FlagValues, LogReporter, Parameter, Questionnaire, StackKind, StackStatus,
    StackType,
};
use apppack_directory::{Directory, MemoryTable};
use apppack_stacks::kinds::App;
use apppack_stacks::secrets::PRIORITY_RANGE;
use apppack_stacks::{Context, Outcome, Session, Settings, create, destroy, modify, upgrade};
use serde_json::json;

fn cloud() -> Arc<FakeCloud> {
    let cloud = Arc::new(FakeCloud::new("us-east-1"));
    cloud.add_hosted_zone(HostedZone {
        id: "/hostedzone/Z0001".to_string(),
        name: "example.com.".to_string(),
        private: false,
        name_servers: vec!["ns-1.awsdns-01.com".to_string()],
    });
    cloud
}

fn session(cloud: &Arc<FakeCloud>, prompter: Arc<ScriptedPrompter>, interactive: bool) -> Session {
    let table = MemoryTable::new();
    table.insert(
        "CLUSTERS",
        "CLUSTER#apppack",
        json!({"stack_id": "id", "stack_name": "apppack-cluster-apppack", "name": "apppack"}),
    );
    Session {
        context: Context {
            non_interactive: !interactive,
            ..Default::default()
        },
        settings: Settings {
            poll_interval: Duration::ZERO,
            ..Default::default()
        },
        gateway: cloud.gateway(),
        directory: Directory::new(Arc::new(table)),
        questionnaire: Questionnaire::new(prompter, interactive),
        reporter: Arc::new(LogReporter),
    }
}

fn batch(cloud: &Arc<FakeCloud>) -> Session {
    session(cloud, Arc::new(ScriptedPrompter::new()), false)
}

/// Cluster and a Postgres database on it, plus GitHub connected to CodeBuild
fn seed_cluster(cloud: &Arc<FakeCloud>) {
    cloud.seed_owned_stack("apppack-cluster-apppack", vec![]);
    cloud.seed_owned_stack(
        "apppack-database-main",
        vec![Parameter::new("ClusterStackName", "apppack-cluster-apppack")],
    );
    cloud.set_source_credentials(&["GITHUB"]);
}

/// An app stack created earlier with a private bucket and the main database
fn seed_app(cloud: &Arc<FakeCloud>) {
    let mut app = App::new("myapp", false);
    let p = &mut app.parameters;
    p.cluster_stack_name = "apppack-cluster-apppack".to_string();
    p.repository_url = "https://github.com/acme/myapp.git".to_string();
    p.repository_type = "GITHUB".to_string();
    p.branch = "main".to_string();
    p.load_balancer_rule_priority = 1234;
    p.private_s3_bucket_enabled = true;
    p.database_stack_name = "apppack-database-main".to_string();
    cloud.seed_owned_stack("apppack-app-myapp", app.parameters());
}

#[tokio::test]
async fn test_create_cluster_with_default_network() {
    let cloud = cloud();
    cloud.set_outputs(
        "apppack-cluster-apppack",
        vec![(
            "LoadBalancerArn".to_string(),
            "arn:aws:elasticloadbalancing:us-east-1:000000000000:loadbalancer/app/apppack/1"
                .to_string(),
        )],
    );
    let s = batch(&cloud);
    let flags = FlagValues::new().with_str("domain", "apps.example.com");

    let outcome = create(&s, StackType::Cluster, "", &flags).await.unwrap();
    let Outcome::Applied(stack) = outcome else {
        panic!("expected the cluster to be applied");
    };
    assert_eq!(stack.stack_name, "apppack-cluster-apppack");
    assert_eq!(stack.status, StackStatus::CreateComplete);

    let requests = cloud.create_requests();
    assert_eq!(requests.len(), 1);
    let params = &requests[0].parameters;
    assert_eq!(find(params, "Domain"), Some("apps.example.com"));
    assert_eq!(find(params, "HostedZone"), Some("Z0001"));
    assert_eq!(find(params, "Cidr"), Some("10.100.0.0/16"));
    assert_eq!(
        find(params, "AvailabilityZones"),
        Some("us-east-1a,us-east-1b,us-east-1c")
    );
    assert!(find(params, "PublicSubnetCidrs").unwrap().starts_with("10.100.0.0/20,"));
    assert!(find(params, "PrivateSubnetCidrs").unwrap().starts_with("10.100.96.0/20,"));
    assert!(requests[0].tags.contains(&("apppack".to_string(), "true".to_string())));

    assert_eq!(
        cloud.load_balancer_protection(
            "arn:aws:elasticloadbalancing:us-east-1:000000000000:loadbalancer/app/apppack/1"
        ),
        Some(true)
    );
}

#[tokio::test]
async fn test_create_app_with_addons() {
    let cloud = cloud();
    seed_cluster(&cloud);
    let s = batch(&cloud);
    let flags = FlagValues::new()
        .with_str("cluster", "apppack")
        .with_str("repository", "https://github.com/acme/myapp.git")
        .with_str("branch", "main")
        .with_str("addon-database-name", "main")
        .with_bool("addon-private-s3", true)
        .with_str("users", "dev@example.com");

    create(&s, StackType::App, "myapp", &flags).await.unwrap();

    let requests = cloud.create_requests();
    let request = &requests[0];
    assert_eq!(request.stack_name, "apppack-app-myapp");
    let params = &request.parameters;
    assert_eq!(find(params, "ClusterStackName"), Some("apppack-cluster-apppack"));
    assert_eq!(find(params, "DatabaseStackName"), Some("apppack-database-main"));
    assert_eq!(find(params, "RedisStackName"), Some(""));
    assert_eq!(find(params, "PrivateS3BucketEnabled"), Some("enabled"));
    assert_eq!(find(params, "RepositoryType"), Some("GITHUB"));
    assert_eq!(find(params, "Name"), Some("myapp"));
    let priority: i64 = find(params, "LoadBalancerRulePriority").unwrap().parse().unwrap();
    assert!(PRIORITY_RANGE.contains(&priority));

    for tag in [
        ("apppack:appName", "myapp"),
        ("apppack:cluster", "apppack"),
        ("apppack", "true"),
    ] {
        assert!(
            request.tags.contains(&(tag.0.to_string(), tag.1.to_string())),
            "missing tag {:?}",
            tag
        );
    }
}

#[tokio::test]
async fn test_create_app_on_missing_cluster() {
    let cloud = cloud();
    let s = batch(&cloud);
    let flags = FlagValues::new()
        .with_str("cluster", "apppack")
        .with_str("repository", "https://github.com/acme/myapp.git")
        .with_str("branch", "main");
    cloud.set_source_credentials(&["GITHUB"]);

    let err = create(&s, StackType::App, "myapp", &flags).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(ref m) if m.contains("does not exist")));
    assert!(cloud.create_requests().is_empty());
}

/// Flags covering every question of an app so only the data-loss prompt remains
fn detach_database_flags() -> FlagValues {
    FlagValues::new()
        .with_str("repository", "https://github.com/acme/myapp.git")
        .with_str("branch", "main")
        .with_str("domains", "")
        .with_str("healthcheck-path", "/")
        .with_bool("addon-private-s3", true)
        .with_bool("addon-public-s3", false)
        .with_bool("addon-sqs", false)
        .with_str("addon-ses-domain", "")
        .with_str("addon-database-name", "")
        .with_str("addon-redis-name", "")
        .with_str("users", "")
}

#[tokio::test]
async fn test_modify_app_detaching_database_confirmed() {
    let cloud = cloud();
    seed_cluster(&cloud);
    seed_app(&cloud);
    let prompter = Arc::new(ScriptedPrompter::new().answer("yes"));
    let s = session(&cloud, prompter.clone(), true);

    let outcome = modify(&s, StackType::App, "myapp", &detach_database_flags())
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Applied(_)));

    let messages = prompter.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("current app database will be permanently destroyed"));
    assert!(!messages[0].contains("S3"));

    let updated = cloud.stack("apppack-app-myapp").unwrap();
    assert_eq!(updated.parameter("DatabaseStackName"), Some(""));
    assert_eq!(updated.parameter("LoadBalancerRulePriority"), Some("1234"));
    assert_eq!(cloud.template_of("apppack-app-myapp"), None);
}

#[tokio::test]
async fn test_modify_app_detaching_database_declined() {
    let cloud = cloud();
    seed_cluster(&cloud);
    seed_app(&cloud);
    let s = session(&cloud, Arc::new(ScriptedPrompter::new().answer("no")), true);

    let err = modify(&s, StackType::App, "myapp", &detach_database_flags())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConfirmationAborted(_)));
    assert_eq!(cloud.count(|c| matches!(c, Call::UpdateStack(_))), 0);

    // Without a terminal there is nobody to type "yes"
    let err = modify(&batch(&cloud), StackType::App, "myapp", &detach_database_flags())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConfirmationAborted(_)));
    assert_eq!(cloud.count(|c| matches!(c, Call::UpdateStack(_))), 0);
}

#[tokio::test]
async fn test_destroy_redis_removes_auth_token() {
    let cloud = cloud();
    cloud.seed_owned_stack(
        "apppack-redis-apppack",
        vec![
            Parameter::new("ClusterStackName", "apppack-cluster-apppack"),
            Parameter::new("Name", "apppack"),
        ],
    );
    cloud.put_parameter("/apppack/redis/apppack/auth-token", "secret", vec![]);
    let prompter = ScriptedPrompter::new().answer("apppack-redis-apppack");
    let s = session(&cloud, Arc::new(prompter), true);

    let outcome = destroy(&s, StackType::Redis, "").await.unwrap();
    assert!(matches!(outcome, Outcome::Destroyed(ref name) if name == "apppack-redis-apppack"));
    assert_eq!(cloud.stack("apppack-redis-apppack"), None);
    assert_eq!(cloud.parameter("/apppack/redis/apppack/auth-token"), None);

    let calls = cloud.calls();
    let deleted_stack = calls
        .iter()
        .position(|c| matches!(c, Call::DeleteStack { .. }))
        .unwrap();
    let deleted_token = calls
        .iter()
        .position(|c| matches!(c, Call::DeleteParameter(_)))
        .unwrap();
    assert!(deleted_stack < deleted_token);
}

#[tokio::test]
async fn test_destroy_missing_redis_still_cleans_up() {
    let cloud = cloud();
    cloud.put_parameter("/apppack/redis/cache/auth-token", "secret", vec![]);
    let prompter = ScriptedPrompter::new().answer("apppack-redis-cache");
    let s = session(&cloud, Arc::new(prompter), true);

    let err = destroy(&s, StackType::Redis, "cache").await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(ref m) if m.contains("no such stack")));
    assert_eq!(cloud.parameter("/apppack/redis/cache/auth-token"), None);
    assert_eq!(cloud.count(|c| matches!(c, Call::DeleteStack { .. })), 0);
}

#[tokio::test]
async fn test_create_retries_rollback_once() {
    let cloud = cloud();
    cloud.script("apppack-account", StackStatus::RollbackComplete);
    cloud.script("apppack-account", StackStatus::DeleteComplete);
    cloud.script("apppack-account", StackStatus::RollbackComplete);
    let s = batch(&cloud);
    let flags = FlagValues::new().with_str("administrators", "ops@example.com");

    let err = create(&s, StackType::Account, "", &flags).await.unwrap_err();
    match err {
        EngineError::StackFailure {
            stack,
            status,
            console_url,
            ..
        } => {
            assert_eq!(stack, "apppack-account");
            assert_eq!(status, "ROLLBACK_COMPLETE");
            assert!(console_url.starts_with(
                "https://us-east-1.console.aws.amazon.com/cloudformation/home?region=us-east-1#/stacks/stackinfo?stackId=arn%3Aaws%3Acloudformation"
            ));
        }
        other => panic!("expected a stack failure, got {:?}", other),
    }

    let requests = cloud.create_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
    assert_eq!(cloud.count(|c| matches!(c, Call::DeleteStack { .. })), 1);
}

#[tokio::test]
async fn test_create_recovers_after_one_rollback() {
    let cloud = cloud();
    cloud.script("apppack-account", StackStatus::RollbackComplete);
    let s = batch(&cloud);
    let flags = FlagValues::new().with_str("administrators", "ops@example.com");

    let outcome = create(&s, StackType::Account, "", &flags).await.unwrap();
    assert!(matches!(outcome, Outcome::Applied(ref stack) if stack.status == StackStatus::CreateComplete));
    assert_eq!(cloud.create_requests().len(), 2);
}

#[tokio::test]
async fn test_check_modify_only_creates_changeset() {
    let cloud = cloud();
    seed_cluster(&cloud);
    seed_app(&cloud);
    let mut s = batch(&cloud);
    s.context.check = true;

    let outcome = modify(&s, StackType::App, "myapp", &FlagValues::new().with_str("branch", "develop"))
        .await
        .unwrap();
    let Outcome::Preview(preview) = outcome else {
        panic!("expected a changeset preview");
    };
    assert!(preview.name.starts_with("update-"));
    assert!(preview.name["update-".len()..].chars().all(|c| c.is_ascii_digit()));
    assert!(preview.url.contains("#/stacks/changesets/changes?stackId="));
    assert!(preview.url.contains("&changeSetId=arn%3Aaws%3Acloudformation"));

    let change_sets: Vec<_> = cloud
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::CreateChangeSet(input) => Some(input),
            _ => None,
        })
        .collect();
    assert_eq!(change_sets.len(), 1);
    assert_eq!(change_sets[0].change_set_type, ChangeSetType::Update);
    assert_eq!(find(&change_sets[0].request.parameters, "Branch"), Some("develop"));
    assert_eq!(cloud.count(|c| matches!(c, Call::UpdateStack(_))), 0);
    assert_eq!(
        cloud.stack("apppack-app-myapp").unwrap().parameter("Branch"),
        Some("main")
    );
}

#[tokio::test]
async fn test_check_create_then_create() {
    let cloud = cloud();
    let mut s = batch(&cloud);
    s.context.check = true;
    let flags = FlagValues::new().with_str("administrators", "ops@example.com");

    let outcome = create(&s, StackType::Account, "", &flags).await.unwrap();
    let Outcome::Preview(preview) = outcome else {
        panic!("expected a changeset preview");
    };
    assert!(preview.name.starts_with("create-"));

    // the preview leaves an empty stack in review and creates nothing
    let review = cloud.stack("apppack-account").unwrap();
    assert_eq!(review.status, StackStatus::ReviewInProgress);
    assert_eq!(review.stack_id, preview.stack_id);
    assert!(review.parameters.is_empty());
    assert_eq!(cloud.create_requests().len(), 0);

    s.context.check = false;
    let outcome = create(&s, StackType::Account, "", &flags).await.unwrap();
    assert!(matches!(outcome, Outcome::Applied(ref stack) if stack.status == StackStatus::CreateComplete));

    let deletes: Vec<_> = cloud
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::DeleteStack { stack_id, .. } => Some(stack_id),
            _ => None,
        })
        .collect();
    assert_eq!(deletes, vec![preview.stack_id.clone()]);
    assert_eq!(cloud.create_requests().len(), 1);
    let created = cloud.stack("apppack-account").unwrap();
    assert_ne!(created.stack_id, preview.stack_id);
    assert_eq!(created.parameter("Administrators"), Some("ops@example.com"));
}

#[tokio::test]
async fn test_repeated_check_create_replaces_review_stack() {
    let cloud = cloud();
    let mut s = batch(&cloud);
    s.context.check = true;
    let flags = FlagValues::new().with_str("administrators", "ops@example.com");

    let Outcome::Preview(first) = create(&s, StackType::Account, "", &flags).await.unwrap() else {
        panic!("expected a changeset preview");
    };
    let Outcome::Preview(second) = create(&s, StackType::Account, "", &flags).await.unwrap() else {
        panic!("expected a changeset preview");
    };
    assert_ne!(first.stack_id, second.stack_id);
    assert_eq!(cloud.count(|c| matches!(c, Call::CreateChangeSet(_))), 2);
    assert_eq!(cloud.count(|c| matches!(c, Call::DeleteStack { .. })), 1);
    let review = cloud.stack("apppack-account").unwrap();
    assert_eq!(review.status, StackStatus::ReviewInProgress);
    assert_eq!(review.stack_id, second.stack_id);
}

#[tokio::test]
async fn test_modify_without_changes_reports_unchanged() {
    let cloud = cloud();
    seed_cluster(&cloud);
    seed_app(&cloud);
    cloud.reject_next_update_unchanged("apppack-app-myapp");
    let s = batch(&cloud);

    let outcome = modify(&s, StackType::App, "myapp", &FlagValues::new())
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Unchanged(ref name) if name == "apppack-app-myapp"));
    assert_eq!(cloud.count(|c| matches!(c, Call::UpdateStack(_))), 1);
    assert_eq!(
        cloud.stack("apppack-app-myapp").unwrap().status,
        StackStatus::CreateComplete
    );
}

#[tokio::test]
async fn test_upgrade_without_changes_reports_unchanged() {
    let cloud = cloud();
    seed_cluster(&cloud);
    cloud.reject_next_update_unchanged("apppack-cluster-apppack");
    let s = batch(&cloud);

    let outcome = upgrade(&s, StackType::Cluster, "apppack").await.unwrap();
    assert!(matches!(outcome, Outcome::Unchanged(ref name) if name == "apppack-cluster-apppack"));
}
