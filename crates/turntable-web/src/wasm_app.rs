use std::cell::RefCell;

use leptos::prelude::*;
use turntable_core::MaterialConfig;
use turntable_protocol::{ClientMsg, ErrorBody, ModelSummary};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{HtmlInputElement, MessageEvent, Request, RequestInit, Response, WebSocket};

use crate::tool::{self, JobView, ToolState};

thread_local! {
    static SOCKET: RefCell<Option<WebSocket>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    mount_to_body(|| view! { <App /> });
}

#[component]
fn App() -> impl IntoView {
    let (tool_state, set_tool_state) = signal(ToolState::default());
    let (materials, set_materials) = signal(Vec::<MaterialConfig>::new());
    let (model, set_model) = signal(None::<ModelSummary>);
    let (offset_x, set_offset_x) = signal(0.0f32);
    let (offset_y, set_offset_y) = signal(0.0f32);
    let (angle, set_angle) = signal(0.0f32);
    let (preview_nonce, set_preview_nonce) = signal(0u32);
    let (product, set_product) = signal(String::new());
    let (ring_type, set_ring_type) = signal("ring".to_string());

    Effect::new(move |_| {
        if SOCKET.with(|socket| socket.borrow().is_none()) {
            connect_ws(set_tool_state, set_preview_nonce);
        }
    });

    spawn_local(async move {
        match fetch_text("GET", "/api/materials", None).await {
            Ok(text) => match serde_json::from_str::<Vec<MaterialConfig>>(&text) {
                Ok(list) => set_materials.set(list),
                Err(err) => log(&format!("material list unreadable: {err}")),
            },
            Err(err) => log(&format!("material list failed: {err}")),
        }
    });

    let on_model_file = move |ev: web_sys::Event| {
        let input = event_target::<HtmlInputElement>(&ev);
        let Some(file) = input.files().and_then(|files| files.get(0)) else {
            return;
        };
        let name = String::from(js_sys::encode_uri_component(&file.name()));
        spawn_local(async move {
            let url = format!("/api/model?name={name}");
            match fetch_text("POST", &url, Some(file.as_ref())).await {
                Ok(text) => match serde_json::from_str::<ModelSummary>(&text) {
                    Ok(summary) => {
                        set_model.set(Some(summary));
                        set_preview_nonce.update(|n| *n += 1);
                    }
                    Err(err) => log(&format!("model summary unreadable: {err}")),
                },
                Err(err) => {
                    set_model.set(None);
                    set_tool_state.update(|s| {
                        s.apply(turntable_protocol::ServerMsg::Log {
                            text: format!("model rejected: {err}"),
                        })
                    });
                }
            }
        });
    };

    let send_offset = move || {
        send(&ClientMsg::SetUserOffset {
            dx: offset_x.get_untracked(),
            dy: offset_y.get_untracked(),
        })
    };
    let on_offset_x = move |ev| {
        set_offset_x.set(event_target_value(&ev).parse().unwrap_or(0.0));
        send_offset();
    };
    let on_offset_y = move |ev| {
        set_offset_y.set(event_target_value(&ev).parse().unwrap_or(0.0));
        send_offset();
    };
    let on_brightness = move |ev| {
        let value = event_target_value(&ev).parse().unwrap_or(1.0);
        send(&ClientMsg::SetBrightness { value });
    };
    let on_generate = move |_| {
        send(&ClientMsg::Generate {
            product: product.get_untracked(),
            ring_type: ring_type.get_untracked(),
        })
    };
    let on_cancel = move |_| {
        if let Some(job_id) = tool_state.with_untracked(|s| s.running_job()) {
            send(&ClientMsg::Cancel { job_id });
        }
    };

    let locked = move || tool_state.with(|s| s.controls_locked());
    let selected = move || {
        tool_state.with(|s| s.controls.as_ref().map(|c| c.material.clone()).unwrap_or_default())
    };
    let archive_url = move || {
        tool_state.with(|s| match &s.job {
            JobView::Complete { archive_url, .. } => Some(archive_url.clone()),
            _ => None,
        })
    };
    let preview_src = move || tool::preview_url(angle.get(), preview_nonce.get());

    view! {
        <div class="app">
            <aside class="panel">
                <h1>"turntable"</h1>
                <label class="field">
                    <span>"Model (.glb)"</span>
                    <input type="file" accept=".glb,.gltf" on:change=on_model_file />
                </label>
                <p class="model-info">
                    {move || match model.get() {
                        Some(m) => format!("{}: {} triangles", m.name, m.triangles),
                        None => "no model loaded".to_string(),
                    }}
                </p>
                <div class="swatches">
                    <h2>"Material"</h2>
                    <For
                        each=move || materials.get()
                        key=|m| m.id.clone()
                        children=move |material: MaterialConfig| {
                            let id = material.id.clone();
                            let is_selected = {
                                let id = id.clone();
                                move || selected() == id
                            };
                            view! {
                                <button
                                    class="swatch"
                                    class:selected=is_selected
                                    prop:disabled=locked
                                    on:click=move |_| {
                                        send(&ClientMsg::SelectMaterial { id: id.clone() })
                                    }
                                >
                                    {material.name.clone()}
                                </button>
                            }
                        }
                    />
                </div>
                <div class="sliders">
                    <h2>"Framing"</h2>
                    <label>
                        <span>"Offset X"</span>
                        <input type="range" min="-0.5" max="0.5" step="0.01" prop:value=move || offset_x.get().to_string() on:input=on_offset_x />
                    </label>
                    <label>
                        <span>"Offset Y"</span>
                        <input type="range" min="-0.5" max="0.5" step="0.01" prop:value=move || offset_y.get().to_string() on:input=on_offset_y />
                    </label>
                    <label>
                        <span>"Brightness"</span>
                        <input type="range" min="0" max="3" step="0.05" value="1" on:input=on_brightness />
                    </label>
                    <label>
                        <span>"Preview angle"</span>
                        <input
                            type="range"
                            min="0"
                            max="350"
                            step="10"
                            value="0"
                            on:change=move |ev| set_angle.set(event_target_value(&ev).parse().unwrap_or(0.0))
                        />
                    </label>
                </div>
                <div class="generate">
                    <h2>"Sequence"</h2>
                    <input placeholder="product" prop:value=product on:input=move |ev| set_product.set(event_target_value(&ev)) />
                    <input placeholder="ring type" prop:value=ring_type on:input=move |ev| set_ring_type.set(event_target_value(&ev)) />
                    <div class="buttons">
                        <button prop:disabled=locked on:click=on_generate>"Generate"</button>
                        <button prop:disabled=move || !locked() on:click=on_cancel>"Cancel"</button>
                    </div>
                    <p class="status">{move || tool_state.with(|s| s.status_line())}</p>
                    <Show when=move || archive_url().is_some()>
                        <a href=move || archive_url().unwrap_or_default() download="">"Download archive"</a>
                    </Show>
                </div>
                <ul class="log">
                    {move || tool_state.with(|s| s.log.iter().rev().take(8).map(|line| view! { <li>{line.clone()}</li> }).collect_view())}
                </ul>
            </aside>
            <main class="viewport">
                <Show when=move || model.get().is_some()>
                    <img class="preview" src=preview_src />
                </Show>
            </main>
        </div>
    }
}

fn send(msg: &ClientMsg) {
    let Some(text) = tool::encode(msg) else {
        return;
    };
    SOCKET.with(|socket| match socket.borrow().as_ref() {
        Some(ws) => {
            if let Err(err) = ws.send_with_str(&text) {
                log(&format!("ws send failed: {err:?}"));
            }
        }
        None => log("not connected"),
    });
}

async fn fetch_text(method: &str, url: &str, body: Option<&JsValue>) -> Result<String, String> {
    let window = web_sys::window().ok_or("no window")?;
    let init = RequestInit::new();
    init.set_method(method);
    if let Some(body) = body {
        init.set_body(body);
    }
    let request = Request::new_with_str_and_init(url, &init).map_err(js_error)?;
    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_error)?
        .dyn_into()
        .map_err(js_error)?;
    let text = JsFuture::from(response.text().map_err(js_error)?)
        .await
        .map_err(js_error)?
        .as_string()
        .unwrap_or_default();
    if response.ok() {
        Ok(text)
    } else {
        Err(serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("HTTP {}", response.status())))
    }
}

fn js_error(err: JsValue) -> String {
    format!("{err:?}")
}

fn connect_ws(set_tool_state: WriteSignal<ToolState>, set_preview_nonce: WriteSignal<u32>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let location = window.location();
    let hostname = location
        .hostname()
        .unwrap_or_else(|_| "localhost".to_string());
    let port = location.port().unwrap_or_default();
    let protocol = location.protocol().unwrap_or_else(|_| "http:".to_string());
    let url = tool::ws_url(&protocol, &hostname, &port);

    let ws = match WebSocket::new(&url) {
        Ok(ws) => ws,
        Err(err) => {
            log(&format!("ws init failed: {err:?}"));
            return;
        }
    };

    let ws_open = ws.clone();
    let onopen = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        let msg = ClientMsg::Hello {
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        if let Some(text) = tool::encode(&msg) {
            let _ = ws_open.send_with_str(&text);
        }
    }) as Box<dyn FnMut(_)>);
    ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
    onopen.forget();

    let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
        let Some(text) = event.data().as_string() else {
            return;
        };
        match tool::decode(&text) {
            Some(msg) => {
                if matches!(msg, turntable_protocol::ServerMsg::Controls { .. }) {
                    set_preview_nonce.update(|n| *n += 1);
                }
                set_tool_state.update(|state| state.apply(msg));
            }
            None => log(&format!("ws message: {text}")),
        }
    }) as Box<dyn FnMut(_)>);
    ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget();

    let onclose = Closure::wrap(Box::new(move |_event: web_sys::CloseEvent| {
        log("ws closed");
    }) as Box<dyn FnMut(_)>);
    ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
    onclose.forget();

    SOCKET.with(|socket| *socket.borrow_mut() = Some(ws));
}

fn log(text: &str) {
    web_sys::console::log_1(&text.into());
}
