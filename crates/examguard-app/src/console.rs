//! 콘솔 드라이버.
//!
//! 표준 입력 한 줄을 명령으로 해석해 세션 핸들에 전달하고,
//! 확정된 세션 상태를 사람이 읽을 수 있는 텍스트로 그린다.

use anyhow::Result;
use examguard_core::models::notice::{Notice, NoticeKind};
use examguard_core::models::session::{Connectivity, SessionStatus};
use examguard_network::connectivity::ConnectivityMonitor;
use examguard_session::signal::{HostWindowEvent, HostWindowSource};
use examguard_session::{SessionHandle, SessionView};
use std::fmt::Write;
use std::sync::Arc;

/// 도움말
pub const HELP: &str = "\
명령:
  a <n>     현재 문항에 n번 선택지 선택 (1부터)
  n         다음 문항 (마지막 문항이면 제출)
  p         이전 문항
  s         제출
  d <id>    경고 닫기
  hide      창 숨김 이벤트 주입
  blur      포커스 상실 이벤트 주입
  leave     포인터 이탈 이벤트 주입
  offline   강제 오프라인
  online    강제 오프라인 해제
  restart   종료된 세션 다시 시작
  report    결과 리포트 출력
  q         종료
  help      도움말";

/// 콘솔 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// 0부터 시작하는 선택지 인덱스
    Answer(usize),
    Next,
    Previous,
    Submit,
    Dismiss(u64),
    Window(HostWindowEvent),
    ForceOffline(bool),
    Restart,
    Report,
    Help,
    Quit,
}

/// 입력 한 줄 해석. 빈 줄은 `Ok(None)`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();

    let command = match head.to_ascii_lowercase().as_str() {
        "a" | "answer" => {
            let n: usize = arg
                .ok_or("선택지 번호가 필요합니다")?
                .parse()
                .map_err(|_| "선택지 번호는 숫자여야 합니다".to_string())?;
            if n == 0 {
                return Err("선택지 번호는 1부터 시작합니다".to_string());
            }
            ConsoleCommand::Answer(n - 1)
        }
        "n" | "next" => ConsoleCommand::Next,
        "p" | "prev" | "previous" => ConsoleCommand::Previous,
        "s" | "submit" => ConsoleCommand::Submit,
        "d" | "dismiss" => {
            let id = arg
                .ok_or("경고 id가 필요합니다")?
                .parse()
                .map_err(|_| "경고 id는 숫자여야 합니다".to_string())?;
            ConsoleCommand::Dismiss(id)
        }
        "hide" => ConsoleCommand::Window(HostWindowEvent::Hidden),
        "blur" => ConsoleCommand::Window(HostWindowEvent::Blur),
        "leave" => ConsoleCommand::Window(HostWindowEvent::PointerLeave),
        "offline" => ConsoleCommand::ForceOffline(true),
        "online" => ConsoleCommand::ForceOffline(false),
        "restart" => ConsoleCommand::Restart,
        "report" => ConsoleCommand::Report,
        "h" | "help" | "?" => ConsoleCommand::Help,
        "q" | "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("알 수 없는 명령: {other} (help 참고)")),
    };
    Ok(Some(command))
}

fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// 세션 상태 렌더링
pub fn render_view(view: &SessionView) -> String {
    let mut out = String::new();
    let offline = match view.connectivity {
        Connectivity::Online => "",
        Connectivity::Offline => " [오프라인: 진행 상황은 로컬에 저장됩니다]",
    };
    let _ = writeln!(
        out,
        "[{}] 남은 시간 {} | 경고 {}/{}{}",
        view.status,
        format_clock(view.time_remaining_secs),
        view.violation_count,
        view.violation_limit,
        offline
    );

    match view.status {
        SessionStatus::InProgress => {
            let q = &view.current_question;
            let _ = writeln!(
                out,
                "문항 {}/{}: {}",
                view.current_index + 1,
                view.total_questions,
                q.prompt
            );
            let selected = view.answers.get(view.current_index).copied().flatten();
            for (i, option) in q.options.iter().enumerate() {
                let mark = if selected == Some(i) { '*' } else { ' ' };
                let _ = writeln!(out, " {mark} {}. {option}", i + 1);
            }
        }
        SessionStatus::Completed => {
            let _ = writeln!(
                out,
                "시험 완료. 점수 {}/{}",
                view.score.unwrap_or(0),
                view.total_questions
            );
        }
        SessionStatus::Terminated => {
            let _ = writeln!(
                out,
                "경고 한도 초과로 시험이 종료되었습니다. 점수 {}/{}",
                view.score.unwrap_or(0),
                view.total_questions
            );
        }
    }

    for violation in &view.violations {
        let _ = writeln!(out, "  ! [{}] {}", violation.id, violation.message);
    }
    out
}

/// 알림 렌더링
pub fn render_notice(notice: &Notice) -> String {
    let label = match notice.kind {
        NoticeKind::PermissionDenied => "권한",
        NoticeKind::NetworkFailure => "네트워크",
        NoticeKind::ChannelDisconnected => "감독 채널",
        NoticeKind::InvalidResponse => "응답 형식",
        NoticeKind::Internal => "내부",
    };
    format!("({label}) {}", notice.message)
}

/// 다시 그릴 만한 변경인지 판단. 남은 시간은 분 단위 경계와 마지막 10초만 반영
pub fn significant_change(prev: &SessionView, next: &SessionView) -> bool {
    if prev.time_remaining_secs != next.time_remaining_secs {
        let t = next.time_remaining_secs;
        if t % 60 == 0 || t <= 10 {
            return true;
        }
    }
    prev.status != next.status
        || prev.connectivity != next.connectivity
        || prev.current_index != next.current_index
        || prev.answers != next.answers
        || prev.violations != next.violations
        || prev.violation_count != next.violation_count
}

/// 명령 실행 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// 명령 실행에 필요한 협력자
pub struct ConsoleContext {
    pub handle: SessionHandle,
    pub window: Arc<HostWindowSource>,
    pub monitor: Arc<ConnectivityMonitor>,
}

/// 명령 실행
pub async fn execute(command: ConsoleCommand, ctx: &ConsoleContext) -> Result<Flow> {
    match command {
        ConsoleCommand::Answer(option) => {
            let index = ctx.handle.view().current_index;
            ctx.handle.select_answer(index, option).await?;
        }
        ConsoleCommand::Next => ctx.handle.next().await?,
        ConsoleCommand::Previous => ctx.handle.previous().await?,
        ConsoleCommand::Submit => ctx.handle.submit().await?,
        ConsoleCommand::Dismiss(id) => ctx.handle.dismiss(id).await?,
        ConsoleCommand::Window(event) => ctx.window.emit(event),
        ConsoleCommand::ForceOffline(force) => {
            ctx.monitor.set_force_offline(force);
            if !force {
                ctx.monitor.record_success();
            }
        }
        ConsoleCommand::Restart => ctx.handle.restart().await?,
        ConsoleCommand::Report => match ctx.handle.report().await? {
            Some(report) => println!("{}", report.render_text()),
            None => println!("시험이 아직 진행 중입니다."),
        },
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}
