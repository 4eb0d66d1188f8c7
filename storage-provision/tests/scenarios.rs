mod common;

use std::path::PathBuf;

use storage_provision::{ProvisionError, execute_strategy};
use storage_sys::{HostAction, RecordingHost};
use storage_types::{
    BootMode, EncryptionOptions, FilesystemType, IdentityRole, LvmOptions, PartitionRole,
    SizeMib, Strategy, SwapRequest, VolumeRole,
};

use common::{commands_of, mount_targets, plan};

#[test]
fn simple_luks_firmware_single_disk() {
    let plan = plan(
        &["/dev/sda"],
        BootMode::Firmware,
        Strategy::SimpleLuks(EncryptionOptions::with_passphrase("open sesame")),
    );
    let mut host = RecordingHost::new();

    let outcome = execute_strategy(&mut host, &plan).unwrap();
    let commands = host.commands();

    assert_eq!(
        &commands[..9],
        &[
            "wipefs --all --force /dev/sda",
            "parted --script /dev/sda mklabel gpt",
            "parted --script --align optimal /dev/sda mkpart ESP fat32 1MiB 101MiB",
            "parted --script /dev/sda set 1 esp on",
            "parted --script --align optimal /dev/sda mkpart XBOOTLDR fat32 101MiB 1125MiB",
            "parted --script /dev/sda set 2 bls_boot on",
            "parted --script --align optimal /dev/sda mkpart root 1125MiB 100%",
            "partprobe /dev/sda",
            "udevadm settle",
        ]
    );
    assert_eq!(
        commands_of(&host, "cryptsetup"),
        vec![
            "cryptsetup luksFormat --type luks2 --batch-mode --key-file - /dev/sda3",
            "cryptsetup open --key-file - /dev/sda3 cryptroot",
        ]
    );
    assert!(commands.iter().all(|command| !command.contains("open sesame")));
    assert!(commands.contains(&"mkfs.ext4 -F /dev/mapper/cryptroot".to_string()));
    assert!(commands.contains(&"mkfs.fat -F 32 /dev/sda2".to_string()));

    assert_eq!(mount_targets(&host), vec!["/mnt", "/mnt/boot", "/mnt/boot/efi"]);

    let roles: Vec<_> = outcome.identities.iter().map(|record| record.role).collect();
    assert_eq!(roles, vec![IdentityRole::Root, IdentityRole::XBootLdr]);

    let root = &outcome.identities[0];
    assert_eq!(root.device, PathBuf::from("/dev/mapper/cryptroot"));
    assert!(root.container_uuid.is_some());
    assert_ne!(root.container_uuid.as_deref(), Some(root.uuid.as_str()));
    assert_eq!(outcome.identities[1].device, PathBuf::from("/dev/sda2"));
}

#[test]
fn raid_lvm_two_disks_with_swap_and_home() {
    let mut plan = plan(
        &["/dev/sda", "/dev/sdb"],
        BootMode::Firmware,
        Strategy::RaidLvm(LvmOptions::default()),
    );
    plan.swap = SwapRequest::of(SizeMib::new(4096));
    plan.home.enabled = true;
    plan.home.filesystem = Some(FilesystemType::Xfs);
    let mut host = RecordingHost::new();

    let outcome = execute_strategy(&mut host, &plan).unwrap();

    assert_eq!(
        commands_of(&host, "mdadm"),
        vec![
            "mdadm --create /dev/md0 --run --level=1 --metadata=1.0 --raid-devices=2 /dev/sda2 /dev/sdb2",
            "mdadm --create /dev/md1 --run --level=1 --metadata=1.2 --raid-devices=2 /dev/sda3 /dev/sdb3",
            "mdadm --detail --scan",
        ]
    );
    assert_eq!(commands_of(&host, "vgcreate"), vec!["vgcreate vg0 /dev/md1"]);
    assert_eq!(
        commands_of(&host, "lvcreate"),
        vec![
            "lvcreate --yes -l 90%FREE -n root vg0",
            "lvcreate --yes -L 4096M -n swap vg0",
            "lvcreate --yes -l 100%FREE -n home vg0",
        ]
    );
    // no swap partition: swap lives in the volume group
    assert!(outcome.layouts.iter().all(|layout| {
        layout
            .partitions
            .iter()
            .all(|spec| spec.role != PartitionRole::Swap)
    }));

    assert_eq!(
        mount_targets(&host),
        vec!["/mnt", "/mnt/boot", "/mnt/boot/efi", "/mnt/home"]
    );
    let esp_mounts: Vec<_> = commands_of(&host, "mount")
        .into_iter()
        .filter(|command| command.ends_with("/mnt/boot/efi"))
        .collect();
    assert_eq!(esp_mounts, vec!["mount /dev/sda1 /mnt/boot/efi"]);
    assert!(commands_of(&host, "mkfs.fat").iter().all(|command| !command.contains("/dev/sdb1")));
    assert_eq!(commands_of(&host, "swapon"), vec!["swapon /dev/vg0/swap"]);
    assert_eq!(commands_of(&host, "mkfs.xfs"), vec!["mkfs.xfs -f /dev/vg0/home"]);

    let descriptor_written = host.actions().iter().any(|action| {
        matches!(action, HostAction::AppendFile { path, .. } if path == &PathBuf::from("/mnt/etc/mdadm.conf"))
    });
    assert!(descriptor_written);

    let records: Vec<_> = outcome
        .identities
        .iter()
        .map(|record| (record.role, record.device.clone()))
        .collect();
    assert_eq!(
        records,
        vec![
            (IdentityRole::Root, PathBuf::from("/dev/vg0/root")),
            (IdentityRole::XBootLdr, PathBuf::from("/dev/md0")),
            (IdentityRole::Home, PathBuf::from("/dev/vg0/home")),
        ]
    );
}

#[test]
fn raid_lvm_three_disks_uses_parity_for_data() {
    let plan = plan(
        &["/dev/vda", "/dev/vdb", "/dev/vdc"],
        BootMode::Legacy,
        Strategy::RaidLvm(LvmOptions::default()),
    );
    let mut host = RecordingHost::new();

    let outcome = execute_strategy(&mut host, &plan).unwrap();
    let mdadm = commands_of(&host, "mdadm");

    assert!(mdadm[0].starts_with("mdadm --create /dev/md0 --run --level=1 --metadata=1.0 --raid-devices=3"));
    assert!(mdadm[1].starts_with("mdadm --create /dev/md1 --run --level=5 --metadata=1.2 --raid-devices=3"));
    assert_eq!(
        commands_of(&host, "parted")
            .iter()
            .filter(|command| command.contains("mklabel msdos"))
            .count(),
        3
    );
    assert!(commands_of(&host, "mkfs.ext4").contains(&"mkfs.ext4 -F /dev/md0".to_string()));
    assert_eq!(mount_targets(&host), vec!["/mnt", "/mnt/boot"]);

    let roles: Vec<_> = outcome.identities.iter().map(|record| record.role).collect();
    assert_eq!(roles, vec![IdentityRole::Root, IdentityRole::Boot]);
}

#[test]
fn raid_luks_is_not_implemented() {
    let plan = plan(
        &["/dev/sda", "/dev/sdb"],
        BootMode::Firmware,
        Strategy::RaidLuks(EncryptionOptions::with_passphrase("pw")),
    );
    let mut host = RecordingHost::new();

    let result = execute_strategy(&mut host, &plan);
    assert!(matches!(
        result,
        Err(ProvisionError::NotImplemented {
            strategy: "raid_luks"
        })
    ));
    assert!(host.actions().is_empty());
}

#[test]
fn raid_lvm_luks_is_not_implemented() {
    let plan = plan(
        &["/dev/sda", "/dev/sdb"],
        BootMode::Legacy,
        Strategy::RaidLvmLuks {
            encryption: EncryptionOptions::with_passphrase("pw"),
            lvm: LvmOptions::default(),
        },
    );
    let mut host = RecordingHost::new();

    let error = execute_strategy(&mut host, &plan).unwrap_err();
    assert!(error.is_precondition());
    assert!(host.actions().is_empty());
}

#[test]
fn simple_btrfs_with_swap_partition_mounts_subvolumes() {
    let mut plan = plan(&["/dev/nvme0n1"], BootMode::Legacy, Strategy::Simple);
    plan.root_filesystem = FilesystemType::Btrfs;
    plan.swap = SwapRequest::of(SizeMib::new(2048));
    let mut host = RecordingHost::new();

    let outcome = execute_strategy(&mut host, &plan).unwrap();

    assert_eq!(
        commands_of(&host, "btrfs"),
        vec![
            "btrfs subvolume create /mnt/@",
            "btrfs subvolume create /mnt/@home",
            "btrfs subvolume create /mnt/@var",
            "btrfs subvolume create /mnt/@tmp",
        ]
    );
    assert_eq!(commands_of(&host, "mkswap"), vec!["mkswap /dev/nvme0n1p2"]);
    assert_eq!(commands_of(&host, "swapon"), vec!["swapon /dev/nvme0n1p2"]);

    let mounts: Vec<_> = outcome
        .mounts
        .iter()
        .map(|entry| (entry.target.clone(), entry.options.clone()))
        .collect();
    assert_eq!(
        mounts,
        vec![
            (PathBuf::from("/mnt"), Some("subvol=@".to_string())),
            (PathBuf::from("/mnt/var"), Some("subvol=@var".to_string())),
            (PathBuf::from("/mnt/tmp"), Some("subvol=@tmp".to_string())),
            (PathBuf::from("/mnt/boot"), None),
            (PathBuf::from("/mnt/home"), Some("subvol=@home".to_string())),
        ]
    );

    let root = outcome
        .volumes
        .iter()
        .find(|volume| volume.role == VolumeRole::Root)
        .unwrap();
    assert_eq!(root.mount_point, Some(PathBuf::from("/mnt")));
    assert_eq!(outcome.identities.len(), 2);
}

#[test]
fn simple_luks_with_home_opens_two_containers() {
    let mut plan = plan(
        &["/dev/sda"],
        BootMode::Firmware,
        Strategy::SimpleLuks(EncryptionOptions::with_passphrase("pw")),
    );
    plan.home.enabled = true;
    let mut host = RecordingHost::new();

    let outcome = execute_strategy(&mut host, &plan).unwrap();
    assert_eq!(
        commands_of(&host, "cryptsetup")
            .iter()
            .filter(|command| command.starts_with("cryptsetup open"))
            .cloned()
            .collect::<Vec<_>>(),
        vec![
            "cryptsetup open --key-file - /dev/sda3 cryptroot",
            "cryptsetup open --key-file - /dev/sda4 crypthome",
        ]
    );

    let home = outcome
        .identities
        .iter()
        .find(|record| record.role == IdentityRole::Home)
        .unwrap();
    assert_eq!(home.device, PathBuf::from("/dev/mapper/crypthome"));
    assert!(home.container_uuid.is_some());
}
