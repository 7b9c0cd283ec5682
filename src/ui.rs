use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use crate::emotion::{EmotionLookup, UNKNOWN_COLOR};
use crate::models::{iso_date, MonthlyWalkSummary};
use crate::navigator::{NavigationContext, WalkSnapshot, WalkView};
use crate::stats::StabilityChart;

const PENDING_REFRESH_SECS: u32 = 2;

pub struct DashboardPage<'a> {
    pub year: i32,
    pub month: u32,
    pub summary: Option<&'a MonthlyWalkSummary>,
    pub markers: &'a BTreeMap<NaiveDate, EmotionLookup>,
    pub chart: Option<&'a StabilityChart>,
    pub notice: Option<&'a str>,
}

pub fn render_login(error: Option<&str>) -> String {
    let error = error
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();
    page("마음챙김 산책 서비스", "", &LOGIN_BODY.replace("{{ERROR}}", &error))
}

pub fn render_dashboard(view: &DashboardPage<'_>) -> String {
    let loading = view.summary.is_none() && view.notice.is_none();
    let refresh = if loading || view.markers.values().any(EmotionLookup::is_pending) {
        format!(r#"<meta http-equiv="refresh" content="{PENDING_REFRESH_SECS}" />"#)
    } else {
        String::new()
    };

    let header = match view.summary {
        Some(summary) => render_summary_header(summary),
        None => r#"<h2>산책 기록</h2><p class="muted">데이터를 불러오는 중입니다.</p>"#.to_string(),
    };
    let notice = view
        .notice
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();
    let chart = match view.chart {
        Some(chart) if !chart.is_empty() => render_chart(chart),
        _ => "<p>최신 안정도 데이터가 존재하지 않습니다.</p>".to_string(),
    };

    let (prev_year, prev_month) = shift_month(view.year, view.month, -1);
    let (next_year, next_month) = shift_month(view.year, view.month, 1);

    let body = DASHBOARD_BODY
        .replace("{{HEADER}}", &header)
        .replace("{{NOTICE}}", &notice)
        .replace("{{STATS}}", &view.summary.map(render_stats).unwrap_or_default())
        .replace("{{CHART}}", &chart)
        .replace("{{TITLE}}", &format!("{}년 {}월", view.year, view.month))
        .replace("{{PREV}}", &format!("/dashboard?year={prev_year}&month={prev_month}"))
        .replace("{{NEXT}}", &format!("/dashboard?year={next_year}&month={next_month}"))
        .replace("{{CALENDAR}}", &render_calendar(view.year, view.month, view.summary, view.markers));
    page("산책 대시보드", &refresh, &body)
}

pub fn render_walk_detail(context: Option<&NavigationContext>, view: &WalkView) -> String {
    let body = match (context, view) {
        (Some(context), WalkView::Ready(snapshot)) => render_snapshot(context, snapshot),
        (Some(context), WalkView::Loading { .. }) => format!(
            "<h1>{} 산책 기록</h1><p>Loading...</p>{}",
            iso_date(context.clicked_date),
            nav_buttons(context)
        ),
        (Some(context), WalkView::Failed { message, .. }) => format!(
            r#"<h1>{} 산책 기록</h1><p class="error">산책 기록을 불러오지 못했습니다. ({})</p>{}"#,
            iso_date(context.clicked_date),
            escape_html(message),
            nav_buttons(context)
        ),
        _ => format!(
            "<h1>산책 기록</h1><p>선택한 날짜의 산책 기록이 없습니다.</p>{}",
            back_button()
        ),
    };
    page("산책 상세", "", &body)
}

fn render_summary_header(summary: &MonthlyWalkSummary) -> String {
    format!(
        r#"<h2>{}님의 산책 기록</h2>
<div class="cactus" title="레벨 {level} 선인장">{}</div>
<p>선인장 레벨: {level}</p>
<p>선인장 현재 점수: {}</p>"#,
        escape_html(&summary.nickname),
        "🌵".repeat(summary.cactus_level as usize),
        summary.cactus_score,
        level = summary.cactus_level,
    )
}

fn render_stats(summary: &MonthlyWalkSummary) -> String {
    let stress = summary
        .stress_index
        .map(|score| score.to_string())
        .unwrap_or_else(|| "-".to_string());
    let stress_date = summary.stress_index_date.as_deref().unwrap_or("-");
    format!(
        r#"<section class="panel">
  <div class="stat"><p>누적 산책 거리: {} km</p><p>누적 산책 시간: {} 시간</p></div>
  <div class="stat"><p>최근 스트레스 지수: {}</p><p>(측정 날짜: {})</p></div>
</section>"#,
        summary.total_distance,
        summary.total_time,
        stress,
        escape_html(stress_date)
    )
}

fn render_chart(chart: &StabilityChart) -> String {
    const WIDTH: f64 = 560.0;
    const HEIGHT: f64 = 200.0;
    const PAD: f64 = 30.0;

    let step = if chart.points.len() > 1 {
        (WIDTH - 2.0 * PAD) / (chart.points.len() - 1) as f64
    } else {
        0.0
    };
    let coords: Vec<(f64, f64)> = chart
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let score = point.stable_score.clamp(0.0, 100.0);
            (PAD + step * i as f64, HEIGHT - PAD - score / 100.0 * (HEIGHT - 2.0 * PAD))
        })
        .collect();

    let polyline = coords
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ");
    let mut dots = String::new();
    for ((x, y), point) in coords.iter().zip(&chart.points) {
        dots.push_str(&format!(
            r##"<circle cx="{x:.1}" cy="{y:.1}" r="4" fill="#4caf50"><title>{}</title></circle><text x="{x:.1}" y="{:.1}" text-anchor="middle">{}</text>"##,
            point.stable_score,
            HEIGHT - 8.0,
            escape_html(&point.label)
        ));
    }

    format!(
        r##"<section class="chart"><h3>산책 안정도</h3>
<svg viewBox="0 0 {WIDTH} {HEIGHT}" role="img" aria-label="산책 안정도">
<polyline points="{polyline}" fill="none" stroke="#4caf50" stroke-width="2" />{dots}</svg></section>"##
    )
}

fn render_calendar(
    year: i32,
    month: u32,
    summary: Option<&MonthlyWalkSummary>,
    markers: &BTreeMap<NaiveDate, EmotionLookup>,
) -> String {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return String::new();
    };
    let mut html = String::from(
        "<table class=\"calendar\"><thead><tr><th>월</th><th>화</th><th>수</th><th>목</th><th>금</th><th>토</th><th>일</th></tr></thead><tbody><tr>",
    );
    let lead = first.weekday().num_days_from_monday();
    for _ in 0..lead {
        html.push_str("<td></td>");
    }

    let mut day = first;
    while day.month() == month {
        if day != first && day.weekday().num_days_from_monday() == 0 {
            html.push_str("</tr><tr>");
        }
        let marker = if summary.is_some_and(|summary| summary.is_walk_day(day)) {
            let color = markers.get(&day).map(EmotionLookup::color).unwrap_or(UNKNOWN_COLOR);
            format!(
                r#"<a class="marker" href="/dashboard/day/{}" style="color: {color}">●</a>"#,
                iso_date(day)
            )
        } else {
            String::new()
        };
        html.push_str(&format!("<td><span class=\"day\">{}</span>{marker}</td>", day.day()));
        day += Duration::days(1);
    }
    html.push_str("</tr></tbody></table>");
    html
}

fn render_snapshot(context: &NavigationContext, snapshot: &WalkSnapshot) -> String {
    let detail = &snapshot.detail;
    let emotion = &snapshot.emotion;
    let color = emotion.label.color();
    format!(
        r#"<h1>{date} 산책 기록</h1>
<h2 style="color: {color}">{name}</h2>
<div class="emotion-circle" style="background-color: {color}"><span>{fine}</span></div>
<p class="emotion-sentence">{sentence}</p>
<section class="panel">
  <div class="stat"><h4>산책 시작 ~ 종료 시간</h4><p>{start} ~ {end}</p></div>
  <div class="stat"><p>총 산책 거리</p><h2>{distance}</h2><p>m</p></div>
  <div class="stat"><p>총 산책 시간</p><h2>{minutes}</h2><p>분</p></div>
  <div class="stat"><p>산책 안정도</p><h2>{stability}</h2>
    <div class="progress-bar"><div class="progress" style="width: {stability}%"></div></div></div>
  <div class="stat"><p>산책 만족도</p><div class="star-rating">{stars}</div><p>{score}</p></div>
</section>
<p class="muted">{position} / {total}</p>
{buttons}"#,
        date = iso_date(context.clicked_date),
        name = emotion.label.korean_name(),
        fine = escape_html(&emotion.fine_label),
        sentence = escape_html(&emotion.sentence),
        start = escape_html(&detail.start_time),
        end = escape_html(&detail.end_time),
        distance = detail.distance_meters,
        minutes = detail.actual_walk_minutes,
        stability = detail.stability_score,
        stars = snapshot.rating.stars(),
        score = snapshot.rating.label(),
        position = snapshot.index + 1,
        total = context.session_ids.len(),
        buttons = nav_buttons(context),
    )
}

fn nav_buttons(context: &NavigationContext) -> String {
    let mut html = String::from(r#"<div class="actions">"#);
    if context.has_previous() {
        html.push_str(r#"<form method="post" action="/walk-history/previous"><button type="submit">이전</button></form>"#);
    }
    if context.has_next() {
        html.push_str(r#"<form method="post" action="/walk-history/next"><button type="submit">다음</button></form>"#);
    }
    html.push_str(&back_button());
    html.push_str("</div>");
    html
}

fn back_button() -> String {
    r#"<form method="post" action="/walk-history/close"><button type="submit">메인화면</button></form>"#
        .to_string()
}

pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn page(title: &str, head: &str, body: &str) -> String {
    PAGE_HTML
        .replace("{{TITLE}}", title)
        .replace("{{HEAD}}", head)
        .replace("{{BODY}}", body)
}

const LOGIN_BODY: &str = r#"<h1>마음챙김 산책 서비스</h1>
<h2>로그인</h2>
{{ERROR}}
<form method="post" action="/login" class="login-form">
  <input type="text" name="username" placeholder="Username" />
  <input type="password" name="password" placeholder="Password" />
  <button type="submit">Login</button>
</form>"#;

const DASHBOARD_BODY: &str = r#"<header>
{{HEADER}}
<form method="post" action="/logout"><button type="submit">Logout</button></form>
</header>
{{NOTICE}}
{{STATS}}
{{CHART}}
<section class="calendar-container">
  <h3><a href="{{PREV}}">‹</a> {{TITLE}} <a href="{{NEXT}}">›</a></h3>
  {{CALENDAR}}
</section>"#;

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="ko">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  {{HEAD}}
  <title>{{TITLE}}</title>
  <style>
    :root {
      --bg: #f3f7ef;
      --ink: #2b2a28;
      --accent: #4caf50;
      --card: rgba(255, 255, 255, 0.9);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.14);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Noto Sans KR", "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    main {
      width: min(860px, 100%);
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 36px;
      display: grid;
      gap: 24px;
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .stat {
      background: white;
      border-radius: 18px;
      padding: 18px;
      border: 1px solid rgba(47, 72, 88, 0.08);
    }

    .error {
      color: #c0392b;
    }

    .muted {
      color: #8b857d;
    }

    .calendar {
      width: 100%;
      border-collapse: collapse;
      text-align: center;
    }

    .calendar td {
      height: 56px;
      vertical-align: top;
      border: 1px solid rgba(47, 72, 88, 0.06);
    }

    .calendar .day {
      display: block;
      font-size: 0.85rem;
    }

    .marker {
      text-decoration: none;
      font-size: 1.3rem;
    }

    .emotion-circle {
      width: 100px;
      height: 100px;
      border-radius: 50%;
      display: flex;
      justify-content: center;
      align-items: center;
      margin: 0 auto;
      color: white;
      font-weight: bold;
    }

    .progress-bar {
      background: #e0e0e0;
      border-radius: 999px;
      height: 10px;
    }

    .progress {
      background: var(--accent);
      border-radius: 999px;
      height: 10px;
    }

    .star-rating {
      color: #f5af27;
      font-size: 1.4rem;
    }

    .actions {
      display: flex;
      gap: 12px;
    }

    button {
      border: none;
      border-radius: 999px;
      padding: 12px 20px;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent);
      color: white;
    }
  </style>
</head>
<body>
  <main>
{{BODY}}
  </main>
</body>
</html>
"#;
