//! Worker clients against a real scheduler over TCP

use std::sync::Arc;
use std::time::Duration;

use crackpool_cli::{CliError, WorkerClient};
use crackpool_core::{
    message, BruteforceJob, ConnectionId, CrackpoolConfig, HashAlgorithm, HashTask,
    InMemoryCorpus, Job, JobInformation, MessageType, ServerEvent, Timestamp, WordlistCorpus,
    WordlistJob, WorkerFrame,
};
use crackpool_runtime::{RuntimeBuilder, RuntimeHandle};
use crackpool_tcp::{decode_frame, encode_frame, FrameReader, TcpConfig, TcpTransportTask};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(15);

async fn start_server(corpus: Arc<dyn WordlistCorpus>) -> (RuntimeHandle, String) {
    let transport = TcpTransportTask::bind(TcpConfig::testing()).await.unwrap();
    let addr = transport.local_addr().unwrap().to_string();
    let runtime = RuntimeBuilder::new()
        .with_config(CrackpoolConfig::testing())
        .with_corpus(corpus)
        .add_transport(Box::new(transport))
        .build_and_start()
        .await
        .unwrap();
    (runtime, addr)
}

#[tokio::test]
async fn test_submit_reports_wordlist_solution() {
    let corpus: Arc<dyn WordlistCorpus> = Arc::new(
        InMemoryCorpus::new().with_wordlist("common", ["hunter2", "letmein", "trustno1"], 2),
    );
    let (mut runtime, addr) = start_server(corpus.clone()).await;

    let helper = WorkerClient::connect(&addr, corpus.clone()).await.unwrap();
    let helper_task = tokio::spawn(helper.run(std::future::pending()));

    let submitter = WorkerClient::connect(&addr, corpus).await.unwrap();
    let target = HashAlgorithm::Sha256.digest_hex(b"trustno1");
    let report = timeout(TEST_TIMEOUT, submitter.submit("sha256", &target))
        .await
        .expect("round finishes in time")
        .unwrap();

    assert!(report.starts_with("We cracked your hash!"));
    assert!(report.contains(&format!("sha256:{}", target)));
    assert_eq!(report.lines().last(), Some("trustno1"));

    helper_task.abort();
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_submit_alone_bruteforces() {
    let (mut runtime, addr) = start_server(Arc::new(InMemoryCorpus::new())).await;

    let submitter = WorkerClient::connect(&addr, Arc::new(InMemoryCorpus::new()))
        .await
        .unwrap();
    let target = HashAlgorithm::Md5.digest_hex(b"ab");
    let report = timeout(TEST_TIMEOUT, submitter.submit("md5", &target))
        .await
        .expect("round finishes in time")
        .unwrap();

    assert_eq!(report.lines().last(), Some("ab"));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_submission_is_an_error() {
    let (mut runtime, addr) = start_server(Arc::new(InMemoryCorpus::new())).await;

    let submitter = WorkerClient::connect(&addr, Arc::new(InMemoryCorpus::new()))
        .await
        .unwrap();
    let result = timeout(TEST_TIMEOUT, submitter.submit("crc32", "deadbeef"))
        .await
        .expect("scheduler answers in time");

    match result {
        Err(CliError::Rejected(text)) => assert!(text.starts_with("[ERROR]:")),
        other => panic!("expected a rejection, got {:?}", other),
    }

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_worker_stops_on_shutdown_signal() {
    let (mut runtime, addr) = start_server(Arc::new(InMemoryCorpus::new())).await;

    let worker = WorkerClient::connect(&addr, Arc::new(InMemoryCorpus::new()))
        .await
        .unwrap();
    let stopped = timeout(
        TEST_TIMEOUT,
        worker.run(tokio::time::sleep(Duration::from_millis(50))),
    )
    .await
    .expect("worker stops in time");
    assert!(stopped.is_ok());

    runtime.shutdown().await.unwrap();
}

fn job(algorithm: HashAlgorithm, plaintext: &[u8], information: JobInformation) -> Job {
    let task = HashTask {
        algorithm,
        hash: algorithm.digest_hex(plaintext),
        submitter_id: ConnectionId::new(),
        created_at: Timestamp::new(0),
    };
    Job::new(task, information, Timestamp::new(0))
}

#[tokio::test]
async fn test_new_job_supersedes_running_range() {
    // a bare socket plays the scheduler so frames can be scripted
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let corpus: Arc<dyn WordlistCorpus> =
        Arc::new(InMemoryCorpus::new().with_wordlist("common", ["hunter2", "trustno1"], 2));
    let worker = WorkerClient::connect(&addr, corpus).await.unwrap();
    let (socket, _) = listener.accept().await.unwrap();
    let worker_task = tokio::spawn(worker.run(std::future::pending()));
    let (read_half, mut write_half) = socket.into_split();
    let mut frames = FrameReader::new(read_half, 1 << 16);

    // a range from a round that has since ended, then a job from the next round
    let stale = job(
        HashAlgorithm::Md5,
        b"never",
        JobInformation::Bruteforce(BruteforceJob::create(Vec::new(), 200_000)),
    );
    let current = job(
        HashAlgorithm::Sha256,
        b"trustno1",
        JobInformation::Wordlist(WordlistJob::create("common", 0)),
    );
    let mut script = encode_frame(&ServerEvent::Job(stale)).unwrap();
    script.push_str(&encode_frame(&ServerEvent::Job(current)).unwrap());
    write_half.write_all(script.as_bytes()).await.unwrap();

    // long enough for the stale range to have finished had it kept running
    tokio::time::sleep(Duration::from_secs(1)).await;
    let lifecheck = encode_frame(&ServerEvent::Lifecheck).unwrap();
    write_half.write_all(lifecheck.as_bytes()).await.unwrap();

    let mut reports = Vec::new();
    loop {
        let line = timeout(TEST_TIMEOUT, frames.next_line())
            .await
            .expect("worker answers in time")
            .unwrap()
            .expect("worker stays connected");
        match decode_frame::<WorkerFrame>(&line).unwrap() {
            WorkerFrame::Data(data) => reports.push(data),
            WorkerFrame::Lifecheck => break,
            other => panic!("unexpected frame {:?}", other),
        }
    }
    assert_eq!(
        reports,
        vec![message::encode(MessageType::SolveHash, "sha256", "trustno1")]
    );

    worker_task.abort();
}
