use std::sync::{Arc, Mutex};

use ntfy_client::{
    DispatchError, DispatchStep, FailurePolicy, HandlerErrorSink, Notification,
    NotificationDispatcher, ShellError, ShellInvocation, ShellLauncher, StepError, StepFailure,
};
use serde_json::{json, Map, Value};

type Journal = Arc<Mutex<Vec<String>>>;

/// Records invocations into the shared journal instead of running them.
struct RecordingLauncher {
    journal: Journal,
    invocations: Mutex<Vec<ShellInvocation>>,
    reject: bool,
}

impl RecordingLauncher {
    fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
            invocations: Mutex::new(Vec::new()),
            reject: false,
        })
    }

    fn rejecting(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
            invocations: Mutex::new(Vec::new()),
            reject: true,
        })
    }

    fn invocations(&self) -> Vec<ShellInvocation> {
        self.invocations.lock().unwrap().clone()
    }
}

impl ShellLauncher for RecordingLauncher {
    fn launch(&self, invocation: ShellInvocation) -> Result<(), ShellError> {
        if self.reject {
            return Err(ShellError::Saturated { capacity: 0 });
        }
        self.journal
            .lock()
            .unwrap()
            .push(format!("shell:{invocation}"));
        self.invocations.lock().unwrap().push(invocation);
        Ok(())
    }
}

#[derive(Default)]
struct CollectingSink(Mutex<Vec<String>>);

impl HandlerErrorSink for CollectingSink {
    fn on_failure(&self, failure: &StepFailure) {
        self.0.lock().unwrap().push(failure.step.to_string());
    }
}

fn event(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[test]
fn command_function_receives_words_and_full_record() {
    let seen: Arc<Mutex<Option<(Vec<String>, Notification)>>> = Arc::default();
    let capture = Arc::clone(&seen);

    let dispatcher = NotificationDispatcher::builder()
        .command_function("reboot", move |args, raw_data| {
            let args = args.iter().map(|s| s.to_string()).collect();
            *capture.lock().unwrap() = Some((args, raw_data.clone()));
            Ok(())
        })
        .build()
        .unwrap();

    let raw = event(json!({"id": 7, "message": "reboot now", "extra": true}));
    let report = dispatcher.dispatch_event(raw.clone()).unwrap();

    let (args, record) = seen.lock().unwrap().take().expect("handler ran");
    assert_eq!(args, vec!["reboot", "now"]);
    assert_eq!(record, Notification::normalize(raw));
    assert_eq!(report.command.as_deref(), Some("reboot"));
    assert_eq!(
        report.invoked,
        vec![DispatchStep::CommandFunction("reboot".to_string())]
    );
}

#[test]
fn shell_trigger_runs_the_full_message() {
    let log = journal();
    let launcher = RecordingLauncher::new(&log);
    let dispatcher = NotificationDispatcher::builder()
        .shell_command("ping")
        .launcher(launcher.clone())
        .build()
        .unwrap();

    dispatcher
        .dispatch_event(event(json!({"message": "ping"})))
        .unwrap();
    dispatcher
        .dispatch_event(event(json!({"message": "ping -c 1 example.org"})))
        .unwrap();

    assert_eq!(
        launcher.invocations(),
        vec![
            ShellInvocation::line("ping"),
            ShellInvocation::line("ping -c 1 example.org"),
        ]
    );
}

#[test]
fn alias_runs_stored_argv_and_drops_message_arguments() {
    let log = journal();
    let launcher = RecordingLauncher::new(&log);
    let dispatcher = NotificationDispatcher::builder()
        .shell_alias("deploy", ["ssh", "host", "run-deploy"])
        .launcher(launcher.clone())
        .build()
        .unwrap();

    let report = dispatcher
        .dispatch_event(event(json!({"message": "deploy prod"})))
        .unwrap();

    assert_eq!(
        launcher.invocations(),
        vec![ShellInvocation::Argv {
            program: "ssh".to_string(),
            args: vec!["host".to_string(), "run-deploy".to_string()],
        }]
    );
    assert_eq!(
        report.invoked,
        vec![DispatchStep::ShellAlias("deploy".to_string())]
    );
}

#[test]
fn all_matching_paths_run_once_in_fixed_order() {
    let log = journal();
    let launcher = RecordingLauncher::new(&log);

    let (l1, l2, l3, l4) = (
        Arc::clone(&log),
        Arc::clone(&log),
        Arc::clone(&log),
        Arc::clone(&log),
    );
    let dispatcher = NotificationDispatcher::builder()
        .global_parser("first", move |_| {
            l1.lock().unwrap().push("global:first".to_string());
            Ok(())
        })
        .command_parser("backup", move |_| {
            l2.lock().unwrap().push("parser:backup".to_string());
            Ok(())
        })
        .command_function("backup", move |_, _| {
            l3.lock().unwrap().push("function:backup".to_string());
            Ok(())
        })
        .global_parser("second", move |_| {
            l4.lock().unwrap().push("global:second".to_string());
            Ok(())
        })
        .shell_command("backup")
        .shell_alias("backup", "tar czf /tmp/home.tgz /home")
        .launcher(launcher)
        .build()
        .unwrap();

    let report = dispatcher
        .dispatch_event(event(json!({"message": "backup --now"})))
        .unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "function:backup",
            "parser:backup",
            "shell:backup --now",
            "shell:tar czf /tmp/home.tgz /home",
            "global:first",
            "global:second",
        ]
    );
    assert_eq!(report.invoked.len(), 6);
    assert!(report.failures.is_empty());
}

#[test]
fn unknown_command_still_runs_global_parsers() {
    let log = journal();
    let l1 = Arc::clone(&log);
    let dispatcher = NotificationDispatcher::builder()
        .global_parser("audit", move |record| {
            l1.lock()
                .unwrap()
                .push(record.title().unwrap_or("-").to_string());
            Ok(())
        })
        .shell_command("ping")
        .launcher(RecordingLauncher::new(&log))
        .build()
        .unwrap();

    let report = dispatcher
        .dispatch_event(event(json!({"title": "Alert", "message": "hello world"})))
        .unwrap();

    assert_eq!(entries(&log), vec!["Alert"]);
    assert_eq!(
        report.invoked,
        vec![DispatchStep::GlobalParser("audit".to_string())]
    );
}

#[test]
fn empty_or_missing_message_invokes_nothing() {
    let log = journal();
    let l1 = Arc::clone(&log);
    let dispatcher = NotificationDispatcher::builder()
        .global_parser("audit", move |_| {
            l1.lock().unwrap().push("global".to_string());
            Ok(())
        })
        .build()
        .unwrap();

    for raw in [
        json!({}),
        json!({"message": ""}),
        json!({"message": "   \t "}),
        json!({"message": null}),
        json!({"message": 12}),
    ] {
        let report = dispatcher.dispatch_event(event(raw)).unwrap();
        assert!(report.is_noop());
        assert!(report.invoked.is_empty());
    }
    assert!(entries(&log).is_empty());
}

#[test]
fn failing_handler_aborts_remaining_steps_by_default() {
    let log = journal();
    let launcher = RecordingLauncher::new(&log);
    let l1 = Arc::clone(&log);
    let dispatcher = NotificationDispatcher::builder()
        .command_function("reboot", |_, _| Err("permission denied".into()))
        .shell_command("reboot")
        .global_parser("audit", move |_| {
            l1.lock().unwrap().push("global".to_string());
            Ok(())
        })
        .launcher(launcher.clone())
        .build()
        .unwrap();

    let err = dispatcher
        .dispatch_event(event(json!({"message": "reboot now"})))
        .unwrap_err();

    let DispatchError::Handler { step, source } = &err;
    assert_eq!(step, &DispatchStep::CommandFunction("reboot".to_string()));
    assert_eq!(source.to_string(), "permission denied");
    assert!(launcher.invocations().is_empty());
    assert!(entries(&log).is_empty());
}

#[test]
fn isolate_policy_continues_and_reports_failures() {
    let log = journal();
    let launcher = RecordingLauncher::new(&log);
    let sink = Arc::new(CollectingSink::default());
    let l1 = Arc::clone(&log);
    let dispatcher = NotificationDispatcher::builder()
        .command_function("reboot", |_, _| Err("permission denied".into()))
        .shell_command("reboot")
        .global_parser("audit", move |_| {
            l1.lock().unwrap().push("global".to_string());
            Ok(())
        })
        .launcher(launcher.clone())
        .failure_policy(FailurePolicy::Isolate)
        .error_sink(sink.clone())
        .build()
        .unwrap();

    let report = dispatcher
        .dispatch_event(event(json!({"message": "reboot now"})))
        .unwrap();

    assert_eq!(launcher.invocations(), vec![ShellInvocation::line("reboot now")]);
    assert_eq!(entries(&log), vec!["shell:reboot now", "global"]);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, StepError::Handler(_)));
    assert_eq!(
        *sink.0.lock().unwrap(),
        vec!["command function `reboot`".to_string()]
    );
}

#[test]
fn rejected_launch_is_recorded_without_aborting() {
    let log = journal();
    let l1 = Arc::clone(&log);
    let dispatcher = NotificationDispatcher::builder()
        .shell_command("ping")
        .global_parser("audit", move |_| {
            l1.lock().unwrap().push("global".to_string());
            Ok(())
        })
        .launcher(RecordingLauncher::rejecting(&log))
        .build()
        .unwrap();

    let report = dispatcher
        .dispatch_event(event(json!({"message": "ping"})))
        .unwrap();

    assert_eq!(entries(&log), vec!["global"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].step,
        DispatchStep::ShellCommand("ping".to_string())
    );
    assert!(matches!(
        report.failures[0].error,
        StepError::Launch(ShellError::Saturated { .. })
    ));
}

#[test]
fn re_registration_replaces_the_handler() {
    let log = journal();
    let (l1, l2) = (Arc::clone(&log), Arc::clone(&log));
    let mut dispatcher = NotificationDispatcher::builder()
        .command_function("greet", move |_, _| {
            l1.lock().unwrap().push("old".to_string());
            Ok(())
        })
        .build()
        .unwrap();

    let replaced = dispatcher
        .registries_mut()
        .register_command_function("greet", move |_, _| {
            l2.lock().unwrap().push("new".to_string());
            Ok(())
        });
    assert!(replaced.is_some());

    dispatcher
        .dispatch_event(event(json!({"message": "greet"})))
        .unwrap();
    assert_eq!(entries(&log), vec!["new"]);
}

#[test]
fn builder_surfaces_registration_errors() {
    let err = NotificationDispatcher::builder()
        .shell_command(" ")
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ntfy_client::RegistryError::BlankTrigger {
            kind: "shell command"
        }
    );
}
