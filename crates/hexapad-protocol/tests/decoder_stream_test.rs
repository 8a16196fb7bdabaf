//! Integration tests for KeypadCodec over Tokio streams.
//!
//! These tests push realistic keypad traffic through `FramedRead`, with
//! idle polls, chunked writes and line noise mixed in.

use futures::StreamExt;
use hexapad_core::ArmKey;
use hexapad_protocol::{Command, Event, KeypadCodec, ReaderMode};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::FramedRead;

const IDLE: [u8; 2] = [0xA1, 0x51];

fn key(code: u8) -> [u8; 2] {
    [0xA1, code]
}

#[tokio::test]
async fn test_key_by_key_entry_from_slice() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&IDLE);
    for code in [0x27, 0x27, 0x27, 0x05, 0x0A, 0x0F, 0x11] {
        bytes.extend_from_slice(&key(code));
        bytes.push(0xFF);
    }
    bytes.extend_from_slice(&key(0x23));

    let events: Vec<Event> = FramedRead::new(&bytes[..], KeypadCodec::new())
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(events.first(), Some(&Event::Heartbeat));
    let digits: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            Event::Digit(d) => Some(*d),
            _ => None,
        })
        .collect();
    assert_eq!(digits, vec![9, 9, 9, 1, 2, 3, 4]);
    assert_eq!(events.last(), Some(&Event::Command(Command::Enter)));
}

#[tokio::test]
async fn test_frames_split_across_writes() {
    let (mut writer, reader) = tokio::io::duplex(64);
    let mut framed = FramedRead::new(reader, KeypadCodec::new());

    tokio::spawn(async move {
        writer.write_all(&[0xA3]).await.unwrap();
        writer.write_all(&[0x41, 0xA4]).await.unwrap();
        writer.write_all(&[0x30, 0xA1]).await.unwrap();
        writer.write_all(&[0x2A]).await.unwrap();
    });

    assert_eq!(
        framed.next().await.unwrap().unwrap(),
        Event::Command(Command::ArmSelectIndicator(Some(ArmKey::Away)))
    );
    assert_eq!(
        framed.next().await.unwrap().unwrap(),
        Event::Command(Command::ReaderMode(ReaderMode::Rfid))
    );
    assert_eq!(
        framed.next().await.unwrap().unwrap(),
        Event::Command(Command::Cancel)
    );
    assert!(framed.next().await.is_none());
}

#[tokio::test]
async fn test_noise_then_recovery() {
    let mut bytes = vec![0x01, 0x02, 0x03, 0x04, 0xA1, 0x05];
    bytes.extend_from_slice(&[0xFF, 0xA1, 0x0A]);

    let mut framed = FramedRead::new(&bytes[..], KeypadCodec::new());
    let mut events = Vec::new();
    while let Some(event) = framed.next().await {
        events.push(event.unwrap());
    }

    // The frame caught in the resync window is lost, the one after the
    // filler byte is decoded.
    assert_eq!(events, vec![Event::Digit(2)]);
    let stats = framed.decoder().stats();
    assert_eq!(stats.resyncs, 1);
    assert_eq!(stats.frames, 1);
}

#[tokio::test]
async fn test_entry_frame_through_codec() {
    let mut frame = [0xFFu8; 21];
    frame[0] = 0xA0;
    frame[1] = 0x27;
    frame[2] = 0x27;
    frame[3] = 0x22;
    frame[4] = 0x44;
    frame[5] = 0x05;
    frame[6] = 0x0A;

    let mut framed = FramedRead::new(&frame[..], KeypadCodec::new());
    let event = framed.next().await.unwrap().unwrap();
    let Event::Command(Command::Entry(entry)) = event else {
        panic!("expected an entry frame");
    };
    assert_eq!(entry.prefix.to_string(), "998");
    assert_eq!(entry.arm_key, ArmKey::Dynamic);
    assert_eq!(entry.pin.to_string(), "12");
}
