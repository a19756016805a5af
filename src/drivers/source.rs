use std::collections::VecDeque;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::drivers::decoder::{Frame, FrameDecoder};
use crate::drivers::RasterError;
use crate::types::{ShutdownSignal, WireFormat};

/// Fixed delay between attempts to reach a server that is not up yet.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Upper bound on one connection attempt to an unreachable host.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// Read timeout on socket/serial sources so the receiver can poll shutdown.
pub const READ_POLL_TIMEOUT: Duration = Duration::from_millis(250);
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;

/// Ordered byte stream delivering fixed-size frames.
pub trait ByteSource: Send {
    /// Blocks until `buf` is filled or the stream ends. Returns the number of
    /// bytes read; `0` means the peer closed the stream. An error of kind
    /// `TimedOut`/`WouldBlock` means "nothing yet"; sources that wait on a
    /// partial frame give up with that error once `shutdown` is triggered.
    fn read_frame(&mut self, buf: &mut [u8], shutdown: &ShutdownSignal) -> io::Result<usize>;
    fn describe(&self) -> String;
}

/// True for the error kinds a read timeout produces.
pub fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Reads until `buf` is full or the reader reports end of stream. A timeout
/// with a partial frame keeps waiting so the stream stays aligned, unless
/// shutdown was requested; then the timeout is returned and the partial frame
/// is discarded.
pub fn fill_frame<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    shutdown: &ShutdownSignal,
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_idle(&e) && filled > 0 && !shutdown.is_triggered() => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Sleeps for `delay` in short slices. Returns false if shutdown cut it short.
fn wait_unless_shutdown(shutdown: &ShutdownSignal, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    while !shutdown.is_triggered() {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
    false
}

/// One bounded connection attempt against every resolved address.
fn connect_once(host: &str, port: u16) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("no address resolved for {host}:{port}"),
    );
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Where frames come from. Selected once at startup.
#[derive(Clone, Debug, PartialEq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Serial { path: String, baud: u32 },
    Simulated { sample_period: Duration, max_rate: u32 },
}

impl Endpoint {
    pub fn describe(&self) -> String {
        match self {
            Endpoint::Tcp { host, port } => format!("{host}:{port}"),
            Endpoint::Serial { path, baud } => format!("{path} @ {baud} baud"),
            Endpoint::Simulated { .. } => "simulated source".to_owned(),
        }
    }

    /// Opens the endpoint. TCP retries forever at [`CONNECT_RETRY_DELAY`] and
    /// returns `Ok(None)` if shutdown is signalled while waiting.
    pub fn open(
        &self,
        decoder: FrameDecoder,
        shutdown: &ShutdownSignal,
        mut on_wait: impl FnMut(&str),
    ) -> Result<Option<Box<dyn ByteSource>>, RasterError> {
        match self {
            Endpoint::Tcp { host, port } => {
                loop {
                    if shutdown.is_triggered() {
                        return Ok(None);
                    }
                    match connect_once(host, *port) {
                        Ok(stream) => {
                            stream.set_read_timeout(Some(READ_POLL_TIMEOUT))?;
                            info!("Connected to server {host}:{port}");
                            return Ok(Some(Box::new(TcpSource {
                                stream,
                                peer: self.describe(),
                            })));
                        }
                        Err(e) => {
                            debug!("connect to {host}:{port} failed: {e}");
                            let msg = format!("Waiting for server {host}:{port} to start");
                            info!("{msg}");
                            on_wait(&msg);
                            if !wait_unless_shutdown(shutdown, CONNECT_RETRY_DELAY) {
                                return Ok(None);
                            }
                        }
                    }
                }
            }
            Endpoint::Serial { path, baud } => {
                let port = serialport::new(path.as_str(), *baud)
                    .timeout(READ_POLL_TIMEOUT)
                    .open()?;
                // 等待串口就绪
                thread::sleep(Duration::from_millis(250));
                info!("Opened serial port {path} at {baud} baud");
                Ok(Some(Box::new(SerialSource {
                    port,
                    name: self.describe(),
                })))
            }
            Endpoint::Simulated {
                sample_period,
                max_rate,
            } => Ok(Some(Box::new(SimulatedSource::new(
                decoder,
                *sample_period,
                *max_rate,
            )))),
        }
    }
}

pub struct TcpSource {
    stream: TcpStream,
    peer: String,
}

impl ByteSource for TcpSource {
    fn read_frame(&mut self, buf: &mut [u8], shutdown: &ShutdownSignal) -> io::Result<usize> {
        fill_frame(&mut self.stream, buf, shutdown)
    }
    fn describe(&self) -> String {
        self.peer.clone()
    }
}

pub struct SerialSource {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl ByteSource for SerialSource {
    fn read_frame(&mut self, buf: &mut [u8], shutdown: &ShutdownSignal) -> io::Result<usize> {
        fill_frame(&mut self.port, buf, shutdown)
    }
    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Synthetic activity for running without hardware. Each source channel gets
/// a base rate; every frame jitters around it.
pub struct SimulatedSource {
    decoder: FrameDecoder,
    sample_period: Duration,
    base_rates: Vec<u32>,
    rng: StdRng,
}

impl SimulatedSource {
    pub fn new(decoder: FrameDecoder, sample_period: Duration, max_rate: u32) -> Self {
        Self::with_rng(decoder, sample_period, max_rate, StdRng::from_entropy())
    }

    pub fn with_rng(
        decoder: FrameDecoder,
        sample_period: Duration,
        max_rate: u32,
        mut rng: StdRng,
    ) -> Self {
        let base_rates = (0..decoder.source_channels())
            .map(|_| rng.gen_range(0..=max_rate))
            .collect();
        Self {
            decoder,
            sample_period,
            base_rates,
            rng,
        }
    }

    fn next_frame(&mut self) -> Frame {
        match self.decoder.format() {
            WireFormat::RateCount => {
                let rng = &mut self.rng;
                Frame::Rates(
                    self.base_rates
                        .iter()
                        .map(|&base| {
                            let jitter = (base / 5).max(1) as i64;
                            (base as i64 + rng.gen_range(-jitter..=jitter)).max(0) as u32
                        })
                        .collect(),
                )
            }
            WireFormat::OneHot => {
                Frame::Fired(self.rng.gen_range(0..self.decoder.source_channels().max(1)))
            }
        }
    }
}

impl ByteSource for SimulatedSource {
    fn read_frame(&mut self, buf: &mut [u8], _shutdown: &ShutdownSignal) -> io::Result<usize> {
        thread::sleep(self.sample_period);
        let frame = self.next_frame();
        let bytes = self.decoder.encode(&frame);
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
    fn describe(&self) -> String {
        "simulated source".to_owned()
    }
}

/// In-memory source useful for tests and deterministic playback. Each queued
/// chunk is returned by one read; an empty queue reads as a closed stream.
pub struct ManualSource {
    queue: VecDeque<Vec<u8>>,
}

impl ManualSource {
    pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            queue: chunks.into_iter().collect(),
        }
    }
}

impl ByteSource for ManualSource {
    fn read_frame(&mut self, buf: &mut [u8], _shutdown: &ShutdownSignal) -> io::Result<usize> {
        let Some(chunk) = self.queue.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }
    fn describe(&self) -> String {
        format!("manual source ({} chunks left)", self.queue.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntWidth;
    use std::io::Write;
    use std::net::TcpListener;

    /// Hands out data in small pieces with a timeout in between.
    struct Trickle {
        steps: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
            }
        }
    }

    fn timeout() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "timeout")
    }

    #[test]
    fn fill_frame_waits_through_timeouts_mid_frame() {
        let mut reader = Trickle {
            steps: VecDeque::from(vec![Ok(vec![1]), Err(timeout()), Ok(vec![2, 3])]),
        };
        let mut buf = [0u8; 3];
        assert_eq!(fill_frame(&mut reader, &mut buf, &ShutdownSignal::new()).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn fill_frame_reports_idle_before_first_byte() {
        let mut reader = Trickle {
            steps: VecDeque::from(vec![Err(timeout())]),
        };
        let mut buf = [0u8; 2];
        let err = fill_frame(&mut reader, &mut buf, &ShutdownSignal::new()).unwrap_err();
        assert!(is_idle(&err));
    }

    #[test]
    fn fill_frame_returns_short_count_on_close() {
        let mut reader = Trickle {
            steps: VecDeque::from(vec![Ok(vec![9])]),
        };
        let mut buf = [0u8; 4];
        assert_eq!(fill_frame(&mut reader, &mut buf, &ShutdownSignal::new()).unwrap(), 1);
    }

    #[test]
    fn fill_frame_gives_up_on_partial_frame_after_shutdown() {
        let mut reader = Trickle {
            steps: VecDeque::from(vec![Ok(vec![1]), Err(timeout()), Ok(vec![2])]),
        };
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        let mut buf = [0u8; 2];
        let err = fill_frame(&mut reader, &mut buf, &shutdown).unwrap_err();
        assert!(is_idle(&err));
    }

    /// A port nothing listens on right now.
    fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn tcp_connect_retries_until_server_is_up() {
        let port = free_port();
        let server = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
            let (mut peer, _) = listener.accept().unwrap();
            peer.write_all(&[3, 4]).unwrap();
        });
        let endpoint = Endpoint::Tcp {
            host: "127.0.0.1".into(),
            port,
        };
        let decoder = FrameDecoder::new(WireFormat::RateCount, IntWidth::U8, 2);
        let shutdown = ShutdownSignal::new();
        let mut waits = 0;
        let started = Instant::now();
        let mut source = endpoint
            .open(decoder, &shutdown, |_| waits += 1)
            .unwrap()
            .expect("connected");
        assert!(waits >= 1);
        assert!(started.elapsed() >= CONNECT_RETRY_DELAY);
        let mut buf = [0u8; 2];
        assert_eq!(source.read_frame(&mut buf, &shutdown).unwrap(), 2);
        assert_eq!(buf, [3, 4]);
        server.join().unwrap();
    }

    #[test]
    fn tcp_connect_wait_stops_on_shutdown() {
        let endpoint = Endpoint::Tcp {
            host: "127.0.0.1".into(),
            port: free_port(),
        };
        let decoder = FrameDecoder::new(WireFormat::RateCount, IntWidth::U8, 1);
        let shutdown = ShutdownSignal::new();
        let trigger = shutdown.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.trigger();
        });
        let started = Instant::now();
        let opened = endpoint.open(decoder, &shutdown, |_| {}).unwrap();
        assert!(opened.is_none());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn manual_source_closes_when_drained() {
        let idle = ShutdownSignal::new();
        let mut source = ManualSource::new(vec![vec![4, 5]]);
        let mut buf = [0u8; 2];
        assert_eq!(source.read_frame(&mut buf, &idle).unwrap(), 2);
        assert_eq!(buf, [4, 5]);
        assert_eq!(source.read_frame(&mut buf, &idle).unwrap(), 0);
    }

    #[test]
    fn simulated_frames_decode_cleanly() {
        let idle = ShutdownSignal::new();
        let decoder = FrameDecoder::new(WireFormat::RateCount, IntWidth::U16Le, 5);
        let mut source = SimulatedSource::with_rng(
            decoder,
            Duration::ZERO,
            40,
            StdRng::seed_from_u64(7),
        );
        let mut buf = vec![0u8; decoder.frame_len()];
        for _ in 0..20 {
            let n = source.read_frame(&mut buf, &idle).unwrap();
            match decoder.decode(&buf[..n]).unwrap() {
                Frame::Rates(counts) => assert_eq!(counts.len(), 5),
                Frame::Fired(_) => panic!("rate-count source produced one-hot frame"),
            }
        }

        let one_hot = FrameDecoder::new(WireFormat::OneHot, IntWidth::U8, 3);
        let mut source =
            SimulatedSource::with_rng(one_hot, Duration::ZERO, 0, StdRng::seed_from_u64(1));
        let mut buf = [0u8; 1];
        let n = source.read_frame(&mut buf, &idle).unwrap();
        assert!(matches!(one_hot.decode(&buf[..n]), Ok(Frame::Fired(i)) if i < 3));
    }
}
