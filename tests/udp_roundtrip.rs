use std::time::Duration;
use tiltpad::config::Config;
use tiltpad::controller::tilt::Acceleration;
use tiltpad::controller::{ControllerHandle, SurfaceEvent};
use tiltpad::protocol::{decode, Command, InputId};
use tiltpad::transport::{Destination, UdpTransport};
use tokio::net::UdpSocket;
use tokio::time::timeout;

async fn receiver() -> (UdpSocket, Destination) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, Destination::new("127.0.0.1", port))
}

async fn next_payload(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 64];
    let len = timeout(Duration::from_secs(2), socket.recv(&mut buf))
        .await
        .expect("no datagram within 2s")
        .unwrap();
    String::from_utf8(buf[..len].to_vec()).unwrap()
}

async fn spawn_controller(destination: Destination) -> ControllerHandle {
    let config = Config {
        destination,
        ..Config::default()
    };
    let transport = UdpTransport::bind().await.unwrap();
    ControllerHandle::spawn(&config, Box::new(transport)).unwrap()
}

#[tokio::test]
async fn button_edges_arrive_as_datagrams() {
    let (socket, destination) = receiver().await;
    let controller = spawn_controller(destination).await;

    controller
        .send(SurfaceEvent::Button {
            id: InputId::BtnA,
            pressed: true,
        })
        .await
        .unwrap();
    assert_eq!(next_payload(&socket).await, "BTN_A:DOWN");

    controller
        .send(SurfaceEvent::Button {
            id: InputId::BtnA,
            pressed: false,
        })
        .await
        .unwrap();
    assert_eq!(next_payload(&socket).await, "BTN_A:UP");

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn steering_streams_and_centres_on_shutdown() {
    let (socket, destination) = receiver().await;
    let controller = spawn_controller(destination).await;

    controller
        .send(SurfaceEvent::Acceleration(Some(Acceleration::new(
            0.0, -4.905, 8.5,
        ))))
        .await
        .unwrap();
    for _ in 0..5 {
        assert_eq!(next_payload(&socket).await, "STEER:-45.00");
    }

    controller.shutdown().await.unwrap();
    let mut last = next_payload(&socket).await;
    while last != "STEER:0.00" {
        assert_eq!(decode(&last).unwrap(), Command::SteerAngle(-45.0));
        last = next_payload(&socket).await;
    }
}

#[tokio::test]
async fn connect_moves_traffic_to_new_peer() {
    let (first, first_destination) = receiver().await;
    let (second, second_destination) = receiver().await;
    let mut config = Config {
        destination: first_destination,
        ..Config::default()
    };
    config.tilt.enabled = false;
    let transport = UdpTransport::bind().await.unwrap();
    let controller = ControllerHandle::spawn(&config, Box::new(transport)).unwrap();

    controller
        .send(SurfaceEvent::Button {
            id: InputId::Lmb,
            pressed: true,
        })
        .await
        .unwrap();
    assert_eq!(next_payload(&first).await, "LMB:DOWN");

    controller.connect(second_destination).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller
        .send(SurfaceEvent::Button {
            id: InputId::Lmb,
            pressed: false,
        })
        .await
        .unwrap();
    assert_eq!(next_payload(&second).await, "LMB:UP");

    controller.shutdown().await.unwrap();
}
