mod common;

use std::path::PathBuf;

use storage_provision::{PlanError, ProvisionError, Step, execute_strategy};
use storage_sys::RecordingHost;
use storage_types::{BootMode, EncryptionOptions, HomeRequest, LvmOptions, Strategy};

use common::{commands_of, plan};

fn assert_plan_error(result: Result<storage_provision::ProvisionOutcome, ProvisionError>) -> PlanError {
    match result {
        Err(ProvisionError::Plan(error)) => error,
        other => panic!("expected a plan error, got {other:?}"),
    }
}

#[test]
fn raid_with_one_disk_issues_nothing() {
    let plan = plan(
        &["/dev/sda"],
        BootMode::Firmware,
        Strategy::RaidLvm(LvmOptions::default()),
    );
    let mut host = RecordingHost::new();

    let error = assert_plan_error(execute_strategy(&mut host, &plan));
    assert!(matches!(error, PlanError::DiskCount { actual: 1, .. }));
    assert!(host.actions().is_empty());
}

#[test]
fn empty_disk_list_issues_nothing() {
    let plan = plan(&[], BootMode::Legacy, Strategy::Simple);
    let mut host = RecordingHost::new();

    let error = assert_plan_error(execute_strategy(&mut host, &plan));
    assert!(matches!(error, PlanError::NoDisks));
    assert!(host.actions().is_empty());
}

#[test]
fn missing_disk_issues_nothing() {
    let plan = plan(
        &["/dev/sda", "/dev/sdz"],
        BootMode::Firmware,
        Strategy::RaidLvm(LvmOptions::default()),
    );
    let mut host = RecordingHost::new().with_missing_path("/dev/sdz");

    let error = assert_plan_error(execute_strategy(&mut host, &plan));
    assert!(matches!(error, PlanError::MissingDisk(disk) if disk == PathBuf::from("/dev/sdz")));
    assert!(host.actions().is_empty());
}

#[test]
fn missing_tool_issues_nothing() {
    let plan = plan(
        &["/dev/sda"],
        BootMode::Firmware,
        Strategy::SimpleLuks(EncryptionOptions::with_passphrase("pw")),
    );
    let mut host = RecordingHost::new().with_missing_tool("cryptsetup");

    let error = assert_plan_error(execute_strategy(&mut host, &plan));
    assert!(matches!(error, PlanError::MissingTool(tool) if tool == "cryptsetup"));
    assert!(host.actions().is_empty());
}

#[test]
fn tool_failure_stops_the_sequence() {
    let plan = plan(&["/dev/sda"], BootMode::Firmware, Strategy::Simple);
    let mut host = RecordingHost::new().with_failure("mkfs.ext4", "/dev/sda3");

    let result = execute_strategy(&mut host, &plan);
    match result {
        Err(ProvisionError::Step { step, device, .. }) => {
            assert_eq!(step, Step::Format);
            assert_eq!(device, PathBuf::from("/dev/sda3"));
        }
        other => panic!("expected a step failure, got {other:?}"),
    }

    assert_eq!(
        host.commands().last().map(String::as_str),
        Some("mkfs.ext4 -F /dev/sda3")
    );
    assert!(commands_of(&host, "mount").is_empty());
    assert!(commands_of(&host, "blkid").is_empty());
}

#[test]
fn partition_that_never_appears_is_a_validation_failure() {
    let plan = plan(&["/dev/sda"], BootMode::Legacy, Strategy::Simple);
    let mut host = RecordingHost::new().with_missing_path("/dev/sda2");

    let result = execute_strategy(&mut host, &plan);
    assert!(matches!(
        result,
        Err(ProvisionError::MissingDevice { step: Step::RereadPartitions, ref path })
            if path == &PathBuf::from("/dev/sda2")
    ));
    assert_eq!(host.commands().last().map(String::as_str), Some("udevadm settle"));
}

#[test]
fn failed_array_assembly_aborts_before_volume_group() {
    let plan = plan(
        &["/dev/sda", "/dev/sdb"],
        BootMode::Firmware,
        Strategy::RaidLvm(LvmOptions::default()),
    );
    let mut host = RecordingHost::new().with_failure("mdadm", "/dev/md1");

    let error = execute_strategy(&mut host, &plan).unwrap_err();
    assert!(!error.is_precondition());
    assert!(commands_of(&host, "pvcreate").is_empty());
    assert!(commands_of(&host, "vgcreate").is_empty());
}

#[test]
fn shared_mapper_name_is_rejected_before_any_disk_is_touched() {
    let encryption = EncryptionOptions {
        home_mapper: "cryptroot".to_string(),
        ..EncryptionOptions::with_passphrase("pw")
    };
    let mut plan = plan(
        &["/dev/sda"],
        BootMode::Firmware,
        Strategy::SimpleLuks(encryption),
    );
    plan.home = HomeRequest {
        enabled: true,
        filesystem: None,
    };
    let mut host = RecordingHost::new();

    let error = assert_plan_error(execute_strategy(&mut host, &plan));
    assert!(matches!(error, PlanError::DuplicateMapper(_)));
    assert!(host.actions().is_empty());
}

#[test]
fn oversized_partitions_are_rejected_without_panicking() {
    let mut plan = plan(&["/dev/sda"], BootMode::Firmware, Strategy::Simple);
    plan.home = HomeRequest {
        enabled: true,
        filesystem: None,
    };
    plan.sizing.boot_mib = i64::MAX as u64;
    plan.sizing.root_mib = i64::MAX as u64;
    let mut host = RecordingHost::new();

    let error = assert_plan_error(execute_strategy(&mut host, &plan));
    assert!(matches!(error, PlanError::Sizing(_)));
    assert!(host.actions().is_empty());
}
