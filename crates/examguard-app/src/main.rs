//! # examguard-app
//!
//! ExamGuard 응시 클라이언트 바이너리 진입점.
//! 어댑터 DI, 세션 시작, 콘솔 드라이버, 라이프사이클 관리.

mod config_loader;
mod console;
mod event_bus;
mod lifecycle;

use anyhow::{Context, Result};
use clap::Parser;
use examguard_core::config::{AppConfig, CaptureDevice};
use examguard_core::error::CoreError;
use examguard_core::models::session::Connectivity;
use examguard_core::ports::media::MediaDevice;
use examguard_core::ports::proctor_channel::ProctorChannel;
use examguard_core::ports::question_source::QuestionSource;
use examguard_core::ports::snapshot_store::SnapshotStore;
use examguard_core::ports::submission::SubmissionClient;
use examguard_network::connectivity::ConnectivityMonitor;
use examguard_network::http_client::HttpExamClient;
use examguard_network::ws_client::{ProctorChannelClient, ReconnectPolicy};
use examguard_session::signal::{HostWindowSource, RemoteAlertSource, SignalSource};
use examguard_session::{LaunchRequest, RuntimeDeps, SessionHandle, SessionLauncher};
use examguard_storage::sqlite::SqliteStorage;
use examguard_vision::capture::{ScreenFeed, SyntheticFeed};
use examguard_vision::encoder::FrameEncoder;
use examguard_vision::frame_pump::FramePump;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::{ConsoleContext, Flow};
use crate::event_bus::{AppEvent, EventBus};
use crate::lifecycle::LifecycleManager;

/// ExamGuard 응시 클라이언트
///
/// 시간 제한 객관식 시험을 감독 하에 진행한다.
#[derive(Parser, Debug)]
#[command(name = "examguard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 서버 URL 지정 (기본: http://localhost:5000)
    #[arg(long, short = 's')]
    server: Option<String>,

    /// 원격 퀴즈 코드. 지정하면 서버에서 문항을 받고 결과를 제출한다
    #[arg(long, short = 'q')]
    quiz: Option<String>,

    /// 로컬 문항 분류 (`--quiz`가 없을 때)
    #[arg(long, default_value = "python")]
    category: String,

    /// 응시자 식별자
    #[arg(long, short = 'u', default_value = "anonymous")]
    user: String,

    /// 데이터 저장 경로
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 감독 채널 비활성화
    #[arg(long)]
    no_proctor: bool,

    /// 저장된 진행 상황을 버리고 새로 시작
    #[arg(long)]
    fresh: bool,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 시간 예산 (초)
    #[arg(long)]
    time_budget: Option<u64>,

    /// 누적 경고 한도
    #[arg(long)]
    violation_limit: Option<u32>,
}

impl Args {
    /// CLI 인자로 설정 덮어쓰기
    fn apply(&self, config: &mut AppConfig) {
        if let Some(server) = &self.server {
            config.server.base_url = server.clone();
        }
        if let Some(budget) = self.time_budget {
            config.session.time_budget_secs = budget;
        }
        if let Some(limit) = self.violation_limit {
            config.session.violation_limit = limit;
        }
        if self.no_proctor {
            config.channel.enabled = false;
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn media_device(config: &AppConfig) -> Arc<dyn MediaDevice> {
    match config.vision.device {
        CaptureDevice::Screen => Arc::new(ScreenFeed::new()),
        CaptureDevice::Synthetic => Arc::new(SyntheticFeed::new(
            config.vision.frame_width,
            config.vision.frame_height,
        )),
    }
}

async fn next_line(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    lines.next_line().await.context("표준 입력 읽기 실패")
}

/// 세션 시작. 권한 거부 시 사용자가 원하면 다시 요청한다
async fn launch_with_retry(
    launcher: &SessionLauncher,
    request: LaunchRequest,
    lifecycle: &LifecycleManager,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<Option<(SessionHandle, JoinHandle<()>)>> {
    loop {
        match launcher.launch(request.clone(), lifecycle.subscribe()).await {
            Ok(started) => return Ok(Some(started)),
            Err(CoreError::PermissionDenied(reason)) => {
                println!("화면/카메라 접근이 거부되었습니다: {reason}");
                println!("권한을 허용한 뒤 Enter로 다시 시도하거나 q로 종료하세요.");
                match next_line(lines).await? {
                    Some(line) if line.trim().eq_ignore_ascii_case("q") => return Ok(None),
                    Some(_) => continue,
                    None => return Ok(None),
                }
            }
            Err(e) => return Err(e).context("세션 시작 실패"),
        }
    }
}

/// 세션/알림/채널/연결 상태를 이벤트 버스로 모은다
fn spawn_bridges(
    bus: &Arc<EventBus>,
    handle: &SessionHandle,
    monitor: &Arc<ConnectivityMonitor>,
    channel: Option<&Arc<ProctorChannelClient>>,
) {
    let mut views = handle.subscribe();
    let tx = bus.clone();
    tokio::spawn(async move {
        let mut last = views.borrow_and_update().clone();
        while views.changed().await.is_ok() {
            let next = views.borrow_and_update().clone();
            if console::significant_change(&last, &next) {
                tx.publish(AppEvent::SessionChanged(Box::new(next.clone())));
            }
            last = next;
        }
    });

    let mut notices = handle.subscribe_notices();
    let tx = bus.clone();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => tx.publish(AppEvent::Notice(notice)),
                Err(RecvError::Lagged(n)) => warn!("알림 {n}개 누락"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 연결 상태는 세션 속성이기도 하므로 런타임에도 전달
    let mut status = monitor.subscribe();
    let tx = bus.clone();
    let session = handle.clone();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            tx.publish(AppEvent::ConnectivityChanged(current));
            if session.set_connectivity(current).await.is_err() {
                break;
            }
        }
    });

    if let Some(channel) = channel {
        let mut state = channel.state();
        let tx = bus.clone();
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                let current = *state.borrow_and_update();
                tx.publish(AppEvent::ChannelChanged(current));
            }
        });
    }
}

fn spawn_printer(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(AppEvent::SessionChanged(view)) => print!("{}", console::render_view(&view)),
                Ok(AppEvent::Notice(notice)) => println!("{}", console::render_notice(&notice)),
                Ok(AppEvent::ConnectivityChanged(Connectivity::Offline)) => {
                    println!("서버 연결이 끊겼습니다. 진행 상황은 로컬에 저장됩니다.")
                }
                Ok(AppEvent::ConnectivityChanged(Connectivity::Online)) => {
                    println!("서버 연결이 복구되었습니다.")
                }
                Ok(AppEvent::ChannelChanged(state)) => debug!("감독 채널 상태 수신: {state}"),
                Err(RecvError::Lagged(n)) => warn!("출력 이벤트 {n}개 누락"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn run_console(ctx: &ConsoleContext, lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    while let Some(line) = next_line(lines).await? {
        let command = match console::parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        match console::execute(command, ctx).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => {
                error!("명령 실행 실패: {e:#}");
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config = config_loader::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("설정 검증 실패")?;
    info!("ExamGuard 시작: 서버 {}", config.server.base_url);

    let lifecycle = LifecycleManager::new();
    let bus = Arc::new(EventBus::default());

    // ── 저장소 ──
    let db_path = config_loader::resolve_db_path(&config, args.data_dir.as_deref());
    let storage = Arc::new(
        SqliteStorage::open(&db_path, &config.storage.snapshot_key)
            .with_context(|| format!("저장소 열기 실패: {}", db_path.display()))?,
    );
    let seeded = storage.seed_samples_if_empty()?;
    if seeded > 0 {
        info!("샘플 문항 {seeded}개 등록");
    }
    if args.fresh {
        storage.clear().await.context("저장된 진행 상황 삭제 실패")?;
        info!("저장된 진행 상황 삭제");
    }

    // ── 네트워크 ──
    let http = Arc::new(
        HttpExamClient::new(&config.server.base_url, config.request_timeout())?
            .with_auth_token(config.server.auth_token.clone())
            .with_max_retries(config.server.max_retries),
    );
    let monitor = Arc::new(ConnectivityMonitor::new(
        config.connectivity.offline_threshold,
    ));

    // 원격 퀴즈만 결과를 제출한다
    let (code, questions, submission) = match &args.quiz {
        Some(quiz) => {
            let source: Arc<dyn QuestionSource> = http.clone();
            let submit: Arc<dyn SubmissionClient> = http.clone();
            (quiz.clone(), source, Some(submit))
        }
        None => {
            let source: Arc<dyn QuestionSource> = storage.clone();
            (args.category.clone(), source, None)
        }
    };

    // ── 위반 신호 ──
    let window = Arc::new(HostWindowSource::default());
    let mut signals: Vec<Arc<dyn SignalSource>> = vec![window.clone()];

    let channel = if config.channel.enabled {
        let client = Arc::new(ProctorChannelClient::new(
            &config.channel_url(),
            ReconnectPolicy::from_config(&config.channel),
        )?);
        signals.push(Arc::new(RemoteAlertSource::new(client.clone())));
        Some(client)
    } else {
        info!("감독 채널 비활성화");
        None
    };

    let media = media_device(&config);
    let store: Arc<dyn SnapshotStore> = storage.clone();
    let launcher = SessionLauncher::new(
        config.session.clone(),
        media.clone(),
        questions,
        RuntimeDeps {
            store,
            submission,
            signals,
        },
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let request = LaunchRequest {
        code,
        user_id: args.user.clone(),
        resume: true,
    };
    let Some((handle, runtime_task)) =
        launch_with_retry(&launcher, request, &lifecycle, &mut lines).await?
    else {
        info!("세션 시작 취소");
        return Ok(());
    };

    // ── 백그라운드 태스크 ──
    {
        let probe = http.clone();
        let shutdown_rx = lifecycle.subscribe();
        tokio::spawn(
            monitor
                .clone()
                .run_probe(probe, config.probe_interval(), shutdown_rx),
        );
    }

    if let Some(client) = &channel {
        tokio::spawn(client.clone().run(lifecycle.subscribe()));

        let pump = FramePump::new(
            media,
            client.clone(),
            FrameEncoder::from_config(&config.vision),
            config.frame_interval(),
        )
        .with_notices(launcher.notice_sender());
        let shutdown_rx = lifecycle.subscribe();
        tokio::spawn(async move {
            let sent = pump.run(shutdown_rx).await;
            info!("감독 프레임 {sent}개 전송");
        });
    }

    spawn_bridges(&bus, &handle, &monitor, channel.as_ref());
    spawn_printer(&bus);

    print!("{}", console::render_view(&handle.view()));
    println!("{}", console::HELP);

    let ctx = ConsoleContext {
        handle: handle.clone(),
        window,
        monitor,
    };

    tokio::select! {
        result = run_console(&ctx, &mut lines) => {
            if let Err(e) = result {
                error!("콘솔 오류: {e:#}");
            }
        }
        _ = lifecycle.wait_for_signal() => {}
    }

    // 시그널 종료는 런타임이 직접 마지막 상태를 저장한다
    if !lifecycle.is_shutdown() {
        if let Err(e) = handle.flush().await {
            warn!("최종 저장 대기 실패: {e}");
        }
        lifecycle.shutdown();
    }
    if let Err(e) = runtime_task.await {
        error!("세션 런타임 비정상 종료: {e}");
    }

    info!("ExamGuard 종료");
    Ok(())
}
