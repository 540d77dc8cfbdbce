//! Operator shell driven end to end.

use std::io::Write;

use tandem_server::{Reply, ServerConfig, Shell};
use tandem_test::coordinator_with;

fn run_script(shell: &Shell, script: &str) -> Vec<Reply> {
    script
        .lines()
        .map(|line| shell.execute_line(line))
        .filter(|reply| *reply != Reply::Empty)
        .collect()
}

fn out(text: &str) -> Reply {
    Reply::Output(text.to_string())
}

#[test]
fn test_booking_script() {
    let shell = Shell::new(coordinator_with(ServerConfig::default().coordinator));
    let replies = run_script(
        &shell,
        "start
         add-flight 1 12 3 300
         add-rooms 1 NYC 5 100
         add-cars 1 NYC 2 50
         new-customer 1 7
         commit 1

         start
         bundle 2 7 NYC true true 12 12
         query-flight 2 12
         query-customer 2 7
         commit 2

         start
         delete-customer 3 7
         query-rooms 3 NYC
         abort 3
         commit 3",
    );

    assert_eq!(replies.len(), 16);
    assert_eq!(replies[0], out("xid 1"));
    assert_eq!(replies[5], out("true"));
    assert_eq!(replies[7], out("true"));
    assert_eq!(replies[8], out("1"));
    assert_eq!(
        replies[9],
        out("Bill for customer 7\n1 car-nyc $50\n2 flight-12 $300\n1 room-nyc $100")
    );
    assert_eq!(replies[12], out("true"));
    assert_eq!(replies[13], out("5"));
    assert_eq!(replies[14], out("aborted"));
    assert!(matches!(&replies[15], Reply::Error(text) if text.contains("TransactionAborted")));
}

#[test]
fn test_config_file_drives_coordinator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tandemd.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "reaper_enabled = false\n\n[coordinator]\ntxn_ttl_ms = 1234").unwrap();

    let config = ServerConfig::from_file(&path).unwrap();
    assert!(!config.reaper_enabled);

    let shell = Shell::new(coordinator_with(config.coordinator));
    assert_eq!(shell.coordinator().registry().ttl().as_millis(), 1234);
    assert_eq!(shell.execute_line("start"), out("xid 1"));
}
