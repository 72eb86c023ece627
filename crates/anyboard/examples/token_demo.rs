//! Drive a simulated token end to end.
//!
//! Builds a Bean token on the mock BLE transport, queries its identity and
//! capabilities, blinks its LED, then prints the events produced when the
//! token is moved across the board. No radio is needed; the mock answers
//! like real token firmware.
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=debug cargo run -p anyboard --example token_demo
//! ```

use std::time::Duration;

use anyboard::gt::frame::{HeaderCounter, encode_message};
use anyboard::gt::{GtTokenBuilder, profiles};
use anyboard::{BleTransport, Capability, Color, LedCapable, Token, TokenEvent};
use anyboard_test_harness::MockBleTransport;
use tracing_subscriber::EnvFilter;

/// Packets a token notifies for `payload`.
fn token_says(payload: &[u8]) -> anyhow::Result<Vec<Vec<u8>>> {
    Ok(encode_message(&mut HeaderCounter::new(), payload)?)
}

/// The packet the host writes for `payload`, tracking the host counter.
fn host_says(counter: &mut HeaderCounter, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut packets = encode_message(counter, payload)?;
    anyhow::ensure!(packets.len() == 1, "request does not fit one packet");
    Ok(packets.remove(0))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Script the token: name, version, LED capability, blink acknowledgement.
    let mut mock = MockBleTransport::new();
    let mut host = HeaderCounter::new();
    mock.expect_multi(&host_says(&mut host, &[32])?, token_says(b"\x20Pawn-7")?);
    mock.expect_multi(&host_says(&mut host, &[33])?, token_says(b"\x21fw 1.4.2")?);
    mock.expect_multi(&host_says(&mut host, &[64])?, token_says(&[64, 1])?);
    mock.expect_multi(
        &host_says(&mut host, &[130, 255, 255, 0, 30])?,
        token_says(&[130])?,
    );
    let handle = mock.handle();

    let token = GtTokenBuilder::new(profiles::bean())
        .address("C8:A0:30:F9:1B:22")
        .recovery_timeout(Duration::from_millis(1500))
        .build_with_transport(Box::new(mock))
        .await?;
    let mut events = token.subscribe()?;

    println!("Token {} ({})", token.address(), token.profile().name);
    println!("  name:    {}", token.name().await?);
    println!("  version: {}", token.version().await?);

    if token.has_capability(Capability::Led).await? {
        token.led_blink(Color::YELLOW).await?;
        println!("  LED blinking {}", Color::YELLOW);
    }

    // The player moves the pawn twice.
    for (new_tile, old_tile) in [(4u8, 3u8), (9, 4)] {
        for packet in token_says(&[194, new_tile, old_tile])? {
            handle.inject(&packet);
        }
    }

    println!("\nEvents:");
    loop {
        match tokio::time::timeout(Duration::from_millis(500), events.recv()).await {
            Ok(Ok(TokenEvent::Received { name: "MOVE", value })) => {
                println!("  MOVE {value:?}");
            }
            Ok(Ok(event)) => println!("  {event:?}"),
            Ok(Err(_)) | Err(_) => break,
        }
    }

    let transport = token.shutdown().await?;
    println!("\nLink closed, transport connected: {}", transport.is_connected());
    Ok(())
}
